//! Command-line parsing. A thin `structopt` wrapper; the actual
//! process bootstrap (fork, `PTRACE_TRACEME`, `execvp`) lives in
//! `main.rs` since it has no state worth unit-testing independently.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "detcore",
    about = "Runs a program inside a deterministic ptrace container"
)]
pub struct Opts {
    /// Increase logging verbosity. Repeatable (-v, -vv).
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u64,

    /// Append log lines to this file in addition to stderr.
    #[structopt(long = "log-file", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// The program to run under the container, and its arguments.
    #[structopt(required = true)]
    pub program: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_program_and_verbosity() {
        let opts = Opts::from_iter(&["detcore", "-vv", "--", "/bin/echo", "hi"]);
        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.program, vec!["/bin/echo".to_string(), "hi".to_string()]);
    }
}
