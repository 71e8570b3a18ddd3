pub mod cli;
pub mod ui;

use std::fs;
use std::io::{self, Cursor, Read as _, Write as _};

use hybridseal::{DecodeBase64, EncodeBase64, Decryptor, Encryptor, Keypair, PublicKeys};

use ui::color::Color;

const DEFAULT_CHUNK_SIZE: u32 = 64 * 1024;

fn fail(message: &str) -> i32 {
    eprintln!("{}: {message}.", Color::error("error"));
    1
}

fn read_input(message: Option<&str>, file: Option<&str>) -> Result<Vec<u8>, i32> {
    if let Some(message) = message {
        return Ok(message.as_bytes().to_vec());
    }
    if let Some(path) = file {
        return fs::read(path).map_err(|err| fail(&format!("could not read '{path}': {err}")));
    }
    let mut buf = Vec::new();
    io::stdin()
        .read_to_end(&mut buf)
        .map_err(|err| fail(&format!("could not read stdin: {err}")))?;
    Ok(buf)
}

fn write_output(output: &[u8], file: Option<&str>) -> Result<(), i32> {
    if let Some(path) = file {
        return fs::write(path, output).map_err(|err| fail(&format!("could not write '{path}': {err}")));
    }
    io::stdout()
        .write_all(output)
        .map_err(|err| fail(&format!("could not write stdout: {err}")))
}

pub fn genkey() -> Result<(), i32> {
    let keypair = Keypair::generate();
    let public = keypair.public_keys();

    println!("private: {}", keypair.to_base64());
    println!("public:  {}", public.to_base64());
    Ok(())
}

pub fn encrypt(args: &cli::Args) -> Result<(), i32> {
    if args.recipients.is_empty() {
        return Err(fail("encrypt needs at least one -r/--recipient"));
    }

    let mut recipients = Vec::with_capacity(args.recipients.len());
    for recipient in &args.recipients {
        let public = PublicKeys::from_base64(recipient)
            .map_err(|err| fail(&format!("invalid recipient key: {err}")))?;
        recipients.push(public);
    }

    let chunk_size = args.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
    let mut encryptor = if let Some(sender) = &args.sender {
        let sender_keypair =
            Keypair::from_base64(sender).map_err(|err| fail(&format!("invalid sender key: {err}")))?;
        Encryptor::with_sender(chunk_size, sender_keypair.signing)
            .map_err(|err| fail(&format!("could not start encryption: {err}")))?
    } else {
        Encryptor::new(chunk_size).map_err(|err| fail(&format!("could not start encryption: {err}")))?
    };
    for recipient in &recipients {
        encryptor.add_recipient(&recipient.agreement);
    }

    let plaintext = read_input(args.message.as_deref(), args.file.as_deref())?;

    let mut ciphertext = Vec::new();
    encryptor
        .encrypt(&mut Cursor::new(plaintext), &mut ciphertext)
        .map_err(|err| fail(&format!("encryption failed: {err}")))?;

    if args.output.is_some() {
        write_output(&ciphertext, args.output.as_deref())
    } else {
        let encoded = ciphertext.encode_base64();
        println!("{encoded}");
        Ok(())
    }
}

pub fn decrypt(args: &cli::Args) -> Result<(), i32> {
    let Some(key) = &args.key else {
        return Err(fail("decrypt needs -k/--key"));
    };
    let keypair = Keypair::from_base64(key).map_err(|err| fail(&format!("invalid key: {err}")))?;

    let expected_sender = match &args.expect_sender {
        Some(encoded) => Some(
            PublicKeys::from_base64(encoded)
                .map_err(|err| fail(&format!("invalid expected sender key: {err}")))?,
        ),
        None => None,
    };

    let ciphertext = if let Some(message) = &args.message {
        message
            .decode_base64()
            .map_err(|err| fail(&format!("invalid base64 input: {err}")))?
    } else {
        read_input(None, args.file.as_deref())?
    };

    let mut decryptor =
        Decryptor::new(Cursor::new(ciphertext)).map_err(|err| fail(&format!("could not read envelope: {err}")))?;
    decryptor
        .set_private_key(&keypair.agreement, expected_sender.as_ref().map(|pk| &pk.verifying))
        .map_err(|err| fail(&format!("could not unlock envelope: {err}")))?;

    let mut plaintext = Vec::new();
    decryptor
        .decrypt_to_end(&mut plaintext)
        .map_err(|err| fail(&format!("decryption failed: {err}")))?;

    write_output(&plaintext, args.output.as_deref())
}
