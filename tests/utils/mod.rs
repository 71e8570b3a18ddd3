#![allow(dead_code)]

use std::env;
use std::io::Write as _;
use std::process::{Command, Stdio};

const HYBRIDSEAL: &str = env!("CARGO_BIN_EXE_hybridseal");

#[derive(Debug)]
pub struct Output {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn run(args: &[&str]) -> Output {
    run_with_stdin(args, &[])
}

pub fn run_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut command = Command::new(HYBRIDSEAL);
    command.env("NO_COLOR", "1");
    command.env_remove("PAGER");
    command.stdin(Stdio::piped());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    for arg in args {
        command.arg(arg);
    }

    let mut child = command.spawn().unwrap();
    child.stdin.take().unwrap().write_all(stdin).unwrap();

    let output = child.wait_with_output().unwrap();

    Output {
        exit_code: output.status.code().unwrap(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

pub fn checksum(payload: &[u8]) -> String {
    // Hexadecimal is nicer to debug than plain bytes.
    blake3::hash(payload).to_hex().to_string()
}

pub fn genkey() -> (String, String) {
    let output = run(&["genkey"]);
    let mut private = None;
    let mut public = None;
    for line in output.stdout.lines() {
        if let Some(key) = line.strip_prefix("private: ") {
            private = Some(key.to_string());
        } else if let Some(key) = line.strip_prefix("public:  ") {
            public = Some(key.to_string());
        }
    }
    (private.unwrap(), public.unwrap())
}
