mod cmd;

use std::env;
use std::process;

use lessify::Pager;

use cmd::cli;

fn main() {
    let args = match cli::Args::build_from_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("fatal: {err}.");
            println!("Try '{bin} -h' for help.", bin = env!("CARGO_BIN_NAME"));
            process::exit(2);
        }
    };

    if args.long_help {
        long_help();
    } else if args.short_help {
        short_help();
    } else if args.version {
        version();
    } else if let Some(command) = &args.command {
        if let Err(code) = match command {
            cli::Command::GenKey => cmd::genkey(),
            cli::Command::Encrypt => cmd::encrypt(&args),
            cli::Command::Decrypt => cmd::decrypt(&args),
        } {
            process::exit(code);
        }
    } else {
        // No arguments.
        short_help();
    }
}

fn short_help() {
    println!("{}", short_help_message());
    println!(
        "For full help, see `{bin} --help`.",
        bin = env!("CARGO_BIN_NAME")
    );
}

fn short_help_message() -> String {
    format!(
        "\
{description}

Usage: {bin} [<options>] <command> [<args>]

Commands:
  genkey                 Generate an X25519 + Ed25519 keypair
  encrypt                Seal a message for one or more recipients
  decrypt                Open a sealed message

Options:
  -h, --help             Show this message and exit
  -V, --version          Show the version and exit
",
        description = env!("CARGO_PKG_DESCRIPTION"),
        bin = env!("CARGO_BIN_NAME"),
    )
}

#[allow(clippy::too_many_lines)]
fn long_help() {
    Pager::page_or_print(&format!(
        "\
{help}
Algorithms:
  Key agreement:    X25519
  Signatures:       Ed25519
  Bulk encryption:  ChaCha20-Poly1305 (HKDF-free, hash-derived per-chunk nonces)

Encrypt options:
  -r, --recipient <key>     Recipient public keybundle (repeatable)
  -s, --sender <key>        Sender private keybundle, to sign the envelope
  -c, --chunk-size <bytes>  Plaintext bytes per chunk (1024..=1048576)
  -f, --file <path>         Read plaintext from a file instead of stdin
  -o, --output <path>       Write the envelope to a file instead of stdout

Decrypt options:
  -k, --key <key>            Recipient private keybundle
  -e, --expect-sender <key>  Require and verify this sender's public keybundle
  -f, --file <path>          Read the envelope from a file instead of stdin
  -o, --output <path>        Write plaintext to a file instead of stdout

What does {package} do?
  {package} seals a byte stream for one or more recipients with a hybrid
  public-key scheme: an ephemeral X25519 key agreement wraps a random data
  key per recipient, and the bulk plaintext is split into authenticated
  chunks so truncation, reordering, and tampering are all detectable.
",
        help = short_help_message(),
        package = env!("CARGO_PKG_NAME"),
    ));
}

fn version() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}
