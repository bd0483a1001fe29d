//! Interactive prompting and the initialization questionnaire.
//!
//! All user interaction goes through the [`Prompter`] trait so the lifecycle
//! can run against a terminal, unattended with defaults, or from a script of
//! canned answers.
//!
//! Conventions shared by every question:
//!
//! - a value in square brackets is the default, taken on an empty answer;
//! - a lone `.` leaves an optional field blank;
//! - an unrecognised answer prints "Invalid input, try again." and re-asks.

use crate::configs::{Protocol, DEFAULT_PORT};
use crate::error::{PkiError, Result};
use crate::subject::Subject;
use std::collections::VecDeque;
use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::net::IpAddr;
use tracing::debug;

pub const BLANK_SENTINEL: &str = ".";
pub const DEFAULT_CLIENT_NAME: &str = "client1";

const CANNOT_BE_BLANK: &str = "This field cannot be left blank.";
const INVALID_INPUT: &str = "Invalid input, try again.";

pub const CLOUDFLARE_DNS: &[&str] = &["1.1.1.1", "1.0.0.1"];
pub const GOOGLE_DNS: &[&str] = &["8.8.8.8", "8.8.4.4"];
pub const OPEN_DNS: &[&str] = &["208.67.222.222", "208.67.220.220"];
pub const LOCAL_DNS: &str = "10.8.0.1";

const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_STATE: &str = "CA";
const DEFAULT_LOCALITY: &str = "San Francisco";
const DEFAULT_ORGANISATION: &str = "Example Org";
const DEFAULT_ORGANISATIONAL_UNIT: &str = "IT";
const DEFAULT_EMAIL: &str = "admin@example.com";

/// Source of answers to interactive questions.
pub trait Prompter {
    /// Ask `question` and return the trimmed answer.
    ///
    /// Re-asks while the answer is empty and the question has no default, or
    /// while the answer is `.` and blanking is not allowed. Running out of
    /// input is a [`PkiError::Validation`].
    fn ask(&mut self, question: &str, allow_blank_sentinel: bool, has_default: bool)
        -> Result<String>;

    /// Print an informational line.
    fn say(&mut self, line: &str);
}

/// Why an answer must be asked again, if it must.
fn rejection(answer: &str, allow_blank_sentinel: bool, has_default: bool) -> Option<&'static str> {
    if answer.is_empty() && !has_default {
        return Some(CANNOT_BE_BLANK);
    }
    if answer == BLANK_SENTINEL && !allow_blank_sentinel {
        return Some(CANNOT_BE_BLANK);
    }
    None
}

/// Prompter reading lines from `input` and writing questions to `output`.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn ask(
        &mut self,
        question: &str,
        allow_blank_sentinel: bool,
        has_default: bool,
    ) -> Result<String> {
        loop {
            write!(self.output, "{} ", question)
                .and_then(|_| self.output.flush())
                .map_err(|e| PkiError::io("Failed to write prompt", e))?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .map_err(|e| PkiError::io("Failed to read answer", e))?;
            if read == 0 {
                return Err(PkiError::Validation(format!(
                    "input closed while asking: {}",
                    question
                )));
            }

            let answer = line.trim();
            match rejection(answer, allow_blank_sentinel, has_default) {
                Some(reason) => self.say(reason),
                None => return Ok(answer.to_string()),
            }
        }
    }

    fn say(&mut self, line: &str) {
        let _ = writeln!(self.output, "{}", line);
    }
}

/// Accepts the default for every question; fails on questions without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Prompter for Unattended {
    fn ask(&mut self, question: &str, _allow_blank: bool, has_default: bool) -> Result<String> {
        if has_default {
            debug!(question, "using default answer");
            Ok(String::new())
        } else {
            Err(PkiError::Validation(format!(
                "no default available in unattended mode for: {}",
                question
            )))
        }
    }

    fn say(&mut self, line: &str) {
        debug!("{}", line);
    }
}

/// Replays queued answers and records everything it was asked and told.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    transcript: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Questions and messages in the order they were produced.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(
        &mut self,
        question: &str,
        allow_blank_sentinel: bool,
        has_default: bool,
    ) -> Result<String> {
        loop {
            self.transcript.push(question.to_string());
            let answer = self.answers.pop_front().ok_or_else(|| {
                PkiError::Validation(format!("script exhausted while asking: {}", question))
            })?;
            let answer = answer.trim().to_string();
            match rejection(&answer, allow_blank_sentinel, has_default) {
                Some(reason) => self.say(reason),
                None => return Ok(answer),
            }
        }
    }

    fn say(&mut self, line: &str) {
        self.transcript.push(line.to_string());
    }
}

// ---- questionnaire ----------------------------------------------------------

/// Explain the prompt conventions before the first question.
pub fn print_intro(prompter: &mut impl Prompter) {
    prompter.say("Please fill in the information below that will be incorporated into your certificate.");
    prompter.say("Some fields have a default value in square brackets, simply press Enter to use these values without entering anything.");
    prompter.say("Some fields can be left blank if desired. Enter a '.' only for a field to be left blank.");
    prompter.say("---");
}

/// `[Y/n]` question; empty answers mean yes.
pub fn ask_yes_no(prompter: &mut impl Prompter, question: &str) -> Result<bool> {
    loop {
        let answer = prompter.ask(question, false, true)?.to_ascii_lowercase();
        match answer.as_str() {
            "" | "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => prompter.say(INVALID_INPUT),
        }
    }
}

/// EdDSA is experimental on the OpenVPN side; declining aborts initialization.
pub fn confirm_eddsa(prompter: &mut impl Prompter) -> Result<()> {
    prompter.say("IMPORTANT!!!");
    prompter.say("You have selected to use EdDSA. EdDSA support is currently experimental.");
    prompter.say("EdDSA keys require OpenVPN 2.4.7+ and OpenSSL 1.1.1+ on your server and clients.");
    if ask_yes_no(prompter, "Continue? [Y/n]:")? {
        Ok(())
    } else {
        Err(PkiError::Validation("aborted".into()))
    }
}

pub fn ask_server_address(prompter: &mut impl Prompter) -> Result<String> {
    prompter.ask("Server address, e.g. myserver.mydomain.com:", false, false)
}

/// Accept 1..=65534.
pub fn parse_port(input: &str) -> Option<u16> {
    match input.parse::<u16>() {
        Ok(port) if port > 0 && port < u16::MAX => Some(port),
        _ => None,
    }
}

pub fn ask_port(prompter: &mut impl Prompter) -> Result<u16> {
    let question = format!("Server Port [{}]:", DEFAULT_PORT);
    loop {
        let answer = prompter.ask(&question, false, true)?;
        if answer.is_empty() {
            return Ok(DEFAULT_PORT);
        }
        match parse_port(&answer) {
            Some(port) => return Ok(port),
            None => prompter.say(INVALID_INPUT),
        }
    }
}

pub fn ask_protocol(prompter: &mut impl Prompter) -> Result<Protocol> {
    loop {
        let answer = prompter.ask("Protocol, 1=UDP, 2=TCP [UDP]:", false, true)?;
        match answer.to_ascii_lowercase().as_str() {
            "" | "1" | "udp" => return Ok(Protocol::Udp),
            "2" | "tcp" => return Ok(Protocol::Tcp),
            _ => prompter.say(INVALID_INPUT),
        }
    }
}

pub fn ask_redirect(prompter: &mut impl Prompter) -> Result<bool> {
    ask_yes_no(prompter, "Redirect all traffic through VPN? [Y/n]:")
}

/// Split a comma separated list and check every entry is an IP address.
pub fn parse_dns_list(input: &str) -> std::result::Result<Vec<String>, String> {
    let mut servers = Vec::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if entry.parse::<IpAddr>().is_err() {
            return Err(format!("{} is not a valid IP Address.", entry));
        }
        servers.push(entry.to_string());
    }
    if servers.is_empty() {
        return Err("No DNS servers given.".into());
    }
    Ok(servers)
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// DNS servers pushed to clients. The default preset is CloudFlare when all
/// traffic is redirected and the VPN server itself otherwise.
pub fn ask_dns(prompter: &mut impl Prompter, redirect: bool) -> Result<Vec<String>> {
    let default_choice = if redirect { "1" } else { "4" };

    prompter.say("Please specify DNS servers to push to connecting clients:");
    prompter.say(&format!("\t1 - CloudFlare ({})", CLOUDFLARE_DNS.join(" & ")));
    prompter.say(&format!("\t2 - Google ({})", GOOGLE_DNS.join(" & ")));
    prompter.say(&format!("\t3 - OpenDNS ({})", OPEN_DNS.join(" & ")));
    prompter.say(&format!(
        "\t4 - Local Server ({}). You will need a DNS server running beside your VPN server",
        LOCAL_DNS
    ));
    prompter.say("\t5 - Custom");
    prompter.say("\t6 - None");

    let question = format!("Please select an option [{}]:", default_choice);
    loop {
        let answer = prompter.ask(&question, true, true)?;
        let choice = if answer.is_empty() {
            default_choice
        } else {
            answer.as_str()
        };
        match choice {
            "1" => return Ok(owned(CLOUDFLARE_DNS)),
            "2" => return Ok(owned(GOOGLE_DNS)),
            "3" => return Ok(owned(OPEN_DNS)),
            "4" => return Ok(vec![LOCAL_DNS.to_string()]),
            "5" => return ask_custom_dns(prompter),
            "6" | BLANK_SENTINEL => return Ok(Vec::new()),
            other => prompter.say(&format!("{} is not a valid choice", other)),
        }
    }
}

fn ask_custom_dns(prompter: &mut impl Prompter) -> Result<Vec<String>> {
    loop {
        let answer = prompter.ask(
            "Enter Custom DNS Servers, comma separated for multiple:",
            false,
            false,
        )?;
        match parse_dns_list(&answer) {
            Ok(servers) => return Ok(servers),
            Err(reason) => prompter.say(&reason),
        }
    }
}

/// Ask an optional subject field: empty takes `default`, `.` leaves it out.
fn ask_optional(
    prompter: &mut impl Prompter,
    label: &str,
    default: &str,
) -> Result<Option<String>> {
    let answer = prompter.ask(&format!("{} [{}]:", label, default), true, true)?;
    Ok(match answer.as_str() {
        "" => Some(default.to_string()),
        BLANK_SENTINEL => None,
        _ => Some(answer),
    })
}

/// Default certificate subject. Anonymous defaults carry only the common
/// name, which is the server address.
pub fn ask_subject(prompter: &mut impl Prompter, address: &str) -> Result<Subject> {
    if ask_yes_no(
        prompter,
        "Would you like to use anonymous defaults for certificate details? [Y/n]:",
    )? {
        return Ok(Subject::new(address));
    }

    let common_name = prompter.ask(
        &format!("Common Name, e.g. your servers name [{}]:", address),
        false,
        true,
    )?;
    let mut subject = Subject::new(if common_name.is_empty() {
        address.to_string()
    } else {
        common_name
    });
    subject.country = ask_optional(prompter, "Country Name, 2 letter ISO code", DEFAULT_COUNTRY)?;
    subject.state = ask_optional(prompter, "State or Province", DEFAULT_STATE)?;
    subject.locality = ask_optional(prompter, "Locality Name, e.g. a City", DEFAULT_LOCALITY)?;
    subject.organisation = ask_optional(prompter, "Organisation Name", DEFAULT_ORGANISATION)?;
    subject.organisational_unit = ask_optional(
        prompter,
        "Organisation Unit, e.g. department",
        DEFAULT_ORGANISATIONAL_UNIT,
    )?;
    subject.email = ask_optional(prompter, "Email Address", DEFAULT_EMAIL)?;
    Ok(subject)
}

pub fn ask_client_name(prompter: &mut impl Prompter) -> Result<String> {
    let answer = prompter.ask(
        &format!(
            "Common Name. This should be unique, for example a username [{}]:",
            DEFAULT_CLIENT_NAME
        ),
        false,
        true,
    )?;
    Ok(if answer.is_empty() {
        DEFAULT_CLIENT_NAME.to_string()
    } else {
        answer
    })
}
