#[derive(Debug, Eq, PartialEq)]
pub enum Command {
    GenKey,
    Encrypt,
    Decrypt,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Default, Eq, PartialEq)]
pub struct Args {
    pub command: Option<Command>,
    pub recipients: Vec<String>,
    pub sender: Option<String>,
    pub expect_sender: Option<String>,
    pub key: Option<String>,
    pub file: Option<String>,
    pub output: Option<String>,
    pub chunk_size: Option<u32>,
    pub message: Option<String>,
    pub short_help: bool,
    pub long_help: bool,
    pub version: bool,
}

impl Args {
    pub fn build_from_args<I>(mut cli_args: I) -> Result<Self, String>
    where
        I: Iterator<Item: AsRef<str> + ToString>,
    {
        let mut args = Self::default();

        while let Some(arg) = cli_args.next() {
            let some_command = args.command.is_some();

            match arg.as_ref() {
                "genkey" if !some_command => args.command = Some(Command::GenKey),
                "encrypt" if !some_command => args.command = Some(Command::Encrypt),
                "decrypt" if !some_command => args.command = Some(Command::Decrypt),
                "-h" => args.short_help = true,
                "--help" => args.long_help = true,
                "-V" | "--version" => args.version = true,
                "-k" | "--key" => {
                    args.key = Some(Self::expect_value(&mut cli_args, "-k/--key")?);
                }
                "-r" | "--recipient" => {
                    args.recipients.push(Self::expect_value(&mut cli_args, "-r/--recipient")?);
                }
                "-s" | "--sender" => {
                    args.sender = Some(Self::expect_value(&mut cli_args, "-s/--sender")?);
                }
                "-e" | "--expect-sender" => {
                    args.expect_sender = Some(Self::expect_value(&mut cli_args, "-e/--expect-sender")?);
                }
                "-f" | "--file" => {
                    args.file = Some(Self::expect_value(&mut cli_args, "-f/--file")?);
                }
                "-o" | "--output" => {
                    args.output = Some(Self::expect_value(&mut cli_args, "-o/--output")?);
                }
                "-c" | "--chunk-size" => {
                    let raw = Self::expect_value(&mut cli_args, "-c/--chunk-size")?;
                    args.chunk_size =
                        Some(raw.parse().map_err(|_| format!("Invalid chunk size: '{raw}'"))?);
                }
                other if some_command && args.message.is_none() => {
                    args.message = Some(other.to_string());
                }
                unknown => {
                    return Err(format!("Unknown argument: '{unknown}'"));
                }
            }
        }

        Ok(args)
    }

    fn expect_value<I>(cli_args: &mut I, flag: &str) -> Result<String, String>
    where
        I: Iterator<Item: AsRef<str> + ToString>,
    {
        cli_args
            .next()
            .map(|value| value.to_string())
            .ok_or_else(|| format!("Missing value for '{flag}'"))
    }
}
