use std::env;

pub const DEFAULT_CALLER_ID: &str = "/roswire_probe";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    /// Report what a publisher declares about a topic.
    Info,
    /// Dump raw frames from a publisher.
    Echo,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub uri: String,
    pub topic: String,
    pub caller_id: String,
    pub count: Option<u64>,
}

impl Config {
    pub fn from_args() -> Result<Self, String> {
        Self::from_args_iter(env::args())
    }

    pub fn from_args_iter<I, S>(iter: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut command: Option<Command> = None;
        let mut uri = env::var("ROSWIRE_URI").ok();
        let mut topic = env::var("ROSWIRE_TOPIC").ok();
        let mut caller_id =
            env::var("ROSWIRE_CALLER_ID").unwrap_or_else(|_| DEFAULT_CALLER_ID.to_string());
        let mut count: Option<u64> = None;

        let mut args = iter.into_iter();
        let _ = args.next();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            match arg {
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                "info" if command.is_none() => {
                    command = Some(Command::Info);
                }
                "echo" if command.is_none() => {
                    command = Some(Command::Echo);
                }
                "--uri" => {
                    if let Some(value) = args.next() {
                        uri = Some(value.as_ref().to_string());
                    }
                }
                "--topic" => {
                    if let Some(value) = args.next() {
                        topic = Some(value.as_ref().to_string());
                    }
                }
                "--caller-id" => {
                    if let Some(value) = args.next() {
                        caller_id = value.as_ref().to_string();
                    }
                }
                "--count" => {
                    if let Some(value) = args.next() {
                        count = parse_count(value.as_ref())?;
                    }
                }
                _ if arg.starts_with("--uri=") => {
                    uri = Some(arg["--uri=".len()..].to_string());
                }
                _ if arg.starts_with("--topic=") => {
                    topic = Some(arg["--topic=".len()..].to_string());
                }
                _ if arg.starts_with("--caller-id=") => {
                    caller_id = arg["--caller-id=".len()..].to_string();
                }
                _ if arg.starts_with("--count=") => {
                    count = parse_count(&arg["--count=".len()..])?;
                }
                other => return Err(format!("unrecognized argument: {other}")),
            }
        }

        let command = command.ok_or_else(|| "expected a command: info | echo".to_string())?;
        let uri = uri.ok_or_else(|| "missing --uri (or ROSWIRE_URI)".to_string())?;
        let topic = topic.ok_or_else(|| "missing --topic (or ROSWIRE_TOPIC)".to_string())?;

        Ok(Self {
            command,
            uri,
            topic,
            caller_id,
            count,
        })
    }
}

fn parse_count(value: &str) -> Result<Option<u64>, String> {
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| format!("invalid --count value: {value}"))
}

pub fn print_usage() {
    println!(
        "roswire_probe <info|echo> --uri tcpros://host:port --topic <name> \
         [--caller-id <name>] [--count <n>]"
    );
}
