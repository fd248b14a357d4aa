//! Interactive credential entry

use std::io::{self, BufRead, Write};

use ghbackup_github::Credentials;

/// Supplies a username/password pair on demand
pub trait CredentialPrompt {
    fn credentials(&self) -> io::Result<Credentials>;
}

/// Reads credentials from the terminal, hiding the password as it is typed
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl CredentialPrompt for ConsolePrompt {
    fn credentials(&self) -> io::Result<Credentials> {
        let stdin = io::stdin();
        let mut input = stdin.lock();

        let username = ask(&mut input, "GitHub username: ")?;
        let password = {
            let _echo = EchoGuard::disable();
            let password = ask(&mut input, "GitHub password: ")?;
            eprintln!();
            password
        };

        Ok(Credentials::new(username, password))
    }
}

fn ask(input: &mut impl BufRead, label: &str) -> io::Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no input while reading credentials",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Turns terminal echo off until dropped
struct EchoGuard {
    #[cfg(unix)]
    saved: Option<String>,
}

impl EchoGuard {
    #[cfg(unix)]
    fn disable() -> Self {
        let saved = stty(&["-g"])
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .filter(|state| !state.is_empty());

        if saved.is_some() {
            let _ = stty(&["-echo"]);
        }

        Self { saved }
    }

    #[cfg(not(unix))]
    fn disable() -> Self {
        Self {}
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Some(state) = &self.saved {
                let _ = stty(&[state.as_str()]);
            }
        }
    }
}

/// Run `stty` against the controlling terminal
///
/// `stty` acts on its stdin, so the terminal is handed over explicitly;
/// `Command::output` would otherwise give it a null stdin.
#[cfg(unix)]
fn stty(args: &[&str]) -> Option<std::process::Output> {
    use std::process::{Command, Stdio};

    let tty = std::fs::File::open("/dev/tty").ok()?;
    Command::new("stty")
        .args(args)
        .stdin(Stdio::from(tty))
        .output()
        .ok()
}
