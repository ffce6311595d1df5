//! Process launch. Forks, lets the child request tracing and
//! `execvp` the target program, and runs the tracer loop in the
//! parent until the whole container is done.

use std::ffi::CString;
use std::process;

use nix::sys::ptrace;
use nix::unistd::{execvp, fork, ForkResult};
use structopt::StructOpt;

use detcore::cli::Opts;
use detcore::config::Config;
use detcore::{log, tracer::Tracer};

fn run_child(program: &[String]) -> ! {
    ptrace::traceme().unwrap_or_else(|e| {
        eprintln!("detcore: PTRACE_TRACEME failed: {}", e);
        process::exit(1);
    });
    let args: Vec<CString> = program
        .iter()
        .map(|s| CString::new(s.as_str()).expect("argument contains a NUL byte"))
        .collect();
    match execvp(&args[0], &args) {
        Ok(_) => unreachable!("execvp returned on success"),
        Err(e) => {
            eprintln!("detcore: execvp({:?}) failed: {}", program[0], e);
            process::exit(127);
        }
    }
}

fn main() {
    let opts = Opts::from_args();
    let config = Config::from_opts(opts.verbose, opts.log_file.clone());
    log::init(config.log_level, config.log_file.as_deref());

    match unsafe { fork() } {
        Ok(ForkResult::Child) => run_child(&opts.program),
        Ok(ForkResult::Parent { child }) => {
            log!(LogInfo, "pid {}: launched {:?}", child, opts.program);
            let code = Tracer::new(child).run().unwrap_or_else(|e| {
                log!(LogError, "detcore: fatal error: {}", e);
                process::exit(1);
            });
            process::exit(code);
        }
        Err(e) => {
            eprintln!("detcore: fork failed: {}", e);
            process::exit(1);
        }
    }
}
