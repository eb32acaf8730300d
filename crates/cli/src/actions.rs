//! Validated request and the card-side action sequence

use std::fmt;
use std::path::Path;

use pgpcard::backup;
use pgpcard::{
    Error, KeyOperation, KeyRole, KeyTemplate, OpenPgpCard, Password, Result, Salutation,
};
use pgpcard_apdu_core::CardTransport;

use crate::Cli;
use crate::output;

/// Key operation selected with `--key-action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum KeyAction {
    /// Generate a new key pair on the card
    Generate,
    /// Read and display the public key
    Read,
    /// Read the public key and write it as PEM
    Export,
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generate => "Generate",
            Self::Read => "Read",
            Self::Export => "Export",
        };
        write!(f, "{name}")
    }
}

/// Fully validated command-line request
///
/// Construction performs every usage check so nothing fails after the
/// first APDU went out.
pub(crate) struct Request {
    pub(crate) info: bool,
    pub(crate) reset: bool,
    pub(crate) pinpad: bool,
    pub(crate) user_pin: String,
    pub(crate) adm_pin: String,
    pub(crate) new_user_pin: Option<String>,
    pub(crate) new_adm_pin: Option<String>,
    pub(crate) reset_code: Option<String>,
    pub(crate) reset_pw1: Option<String>,
    pub(crate) slot: Option<u8>,
    pub(crate) serial: Option<String>,
    pub(crate) salutation: Option<Salutation>,
    pub(crate) name: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) login: Option<String>,
    pub(crate) lang: Option<String>,
    pub(crate) key_type: Option<KeyRole>,
    pub(crate) key_action: Option<KeyAction>,
    pub(crate) templates: Vec<(KeyRole, KeyTemplate)>,
    pub(crate) fingerprints: Vec<(KeyRole, [u8; 20])>,
    pub(crate) seed_key: bool,
    pub(crate) file: String,
    pub(crate) backup: bool,
    pub(crate) restore: bool,
}

impl Request {
    pub(crate) fn from_cli(cli: &Cli) -> Result<Self> {
        if !cli.pinpad && (cli.adm_pin.is_none() || cli.user_pin.is_none()) {
            return Err(Error::usage(
                "If 'pinpad' is not used, 'user-pin' and 'adm-pin' must be provided",
            ));
        }

        if let Some(serial) = &cli.serial {
            check_hex(serial, 4, "Serial")?;
        }
        if let Some(code) = &cli.reset_code {
            check_hex(code, 4, "Reset Code")?;
        }
        if cli.key_action == Some(KeyAction::Export) && cli.file.is_empty() {
            return Err(Error::usage("Provide a file to export public key"));
        }

        let key_type = cli
            .key_type
            .as_deref()
            .map(str::parse::<KeyRole>)
            .transpose()?;

        let templates = match &cli.set_templates {
            Some(value) => per_role(value, key_type, |s| s.parse::<KeyTemplate>())?,
            None => Vec::new(),
        };
        let fingerprints = match &cli.set_fingerprints {
            Some(value) => per_role(value, key_type, parse_fingerprint)?,
            None => Vec::new(),
        };

        let salutation = cli
            .salutation
            .as_deref()
            .map(str::parse::<Salutation>)
            .transpose()?;

        Ok(Self {
            info: cli.info,
            reset: cli.reset,
            pinpad: cli.pinpad,
            user_pin: cli.user_pin.clone().unwrap_or_default(),
            adm_pin: cli.adm_pin.clone().unwrap_or_default(),
            new_user_pin: cli.new_user_pin.clone(),
            new_adm_pin: cli.new_adm_pin.clone(),
            reset_code: cli.reset_code.clone(),
            reset_pw1: cli.reset_pw1.clone(),
            slot: cli.slot,
            serial: cli.serial.clone(),
            salutation,
            name: cli.name.clone(),
            url: cli.url.clone(),
            login: cli.login.clone(),
            lang: cli.lang.clone(),
            key_type,
            key_action: cli.key_action,
            templates,
            fingerprints,
            seed_key: cli.seed_key,
            file: cli.file.clone(),
            backup: cli.backup,
            restore: cli.restore,
        })
    }
}

/// Run the whole request against a connected card
///
/// The sequence mirrors the reference tool: PIN verification first,
/// then slot and profile updates, PIN management, the full read cycle
/// (displayed with `--info`), and finally the key and backup actions.
pub(crate) fn execute<T: CardTransport>(card: &mut OpenPgpCard<T>, req: &Request) -> Result<()> {
    card.select()?;

    println!("Verify PINs...");
    let pins = [
        (Password::Pw1, &req.user_pin),
        (Password::Pw2, &req.user_pin),
        (Password::Pw3, &req.adm_pin),
    ];
    for (pw, pin) in pins {
        if !card.verify_pin(pw, pin, req.pinpad)? {
            return Err(Error::usage("PIN not verified"));
        }
    }

    if let Some(slot) = req.slot {
        card.select_slot(slot - 1)?;
    }

    if let Some(salutation) = req.salutation {
        card.set_salutation(salutation)?;
    }
    if let Some(name) = &req.name {
        card.set_name(name)?;
    }
    if let Some(url) = &req.url {
        card.set_url(url)?;
    }
    if let Some(login) = &req.login {
        card.set_login(login)?;
    }
    if let Some(lang) = &req.lang {
        card.set_lang(lang)?;
    }

    if let Some(new) = &req.new_user_pin {
        if !card.change_pin(Password::Pw1, &req.user_pin, new)? {
            return Err(Error::usage("User PIN not changed"));
        }
    }
    if let Some(new) = &req.new_adm_pin {
        if !card.change_pin(Password::Pw3, &req.adm_pin, new)? {
            return Err(Error::usage("Admin PIN not changed"));
        }
    }
    if let Some(new) = &req.reset_pw1 {
        if !card.reset_user_pin("", new)? {
            return Err(Error::usage("User PIN not reset"));
        }
    } else if let Some(code) = &req.reset_code {
        card.set_resetting_code(code)?;
    }

    println!("Get card info...");
    card.get_all()?;
    if req.info {
        output::print_report(card);
    }

    if req.reset {
        println!("Reset application...");
        card.terminate()?;
        card.activate()?;
        println!(" -> OK");
    }

    for (role, template) in &req.templates {
        println!("Set template {template} for '{role}' Key...");
        card.set_template(*role, *template)?;
    }

    if req.seed_key {
        println!("Seed keys...");
        card.seed_key()?;
    }

    for (role, fingerprint) in &req.fingerprints {
        println!("Set fingerprints for '{role}' Key...");
        card.set_key_fingerprint(*role, fingerprint)?;
    }

    if let Some(serial) = &req.serial {
        card.set_serial(serial)?;
    }

    if let Some(action) = req.key_action {
        handle_key(card, action, req)?;
    }

    if req.backup {
        println!("Backup configuration to '{}'...", req.file);
        backup::backup(card, Path::new(&req.file))?;
        println!(" -> OK");
    } else if req.restore {
        println!("Restore configuration from '{}'...", req.file);
        backup::restore(card, Path::new(&req.file))?;
        println!(" -> OK");
    }

    Ok(())
}

fn handle_key<T: CardTransport>(
    card: &mut OpenPgpCard<T>,
    action: KeyAction,
    req: &Request,
) -> Result<()> {
    let roles = match req.key_type {
        Some(role) => vec![role],
        None => KeyRole::ALL.to_vec(),
    };
    let multiple = roles.len() > 1;

    for role in roles {
        println!("{action} '{role}' Key...");
        let op = match action {
            KeyAction::Generate => KeyOperation::Generate,
            KeyAction::Read | KeyAction::Export => KeyOperation::Read,
        };
        let key = card.asymmetric_key(role, op)?;

        if action == KeyAction::Export {
            let mut filename = if multiple {
                format!("{}_{}", role.name(), req.file)
            } else {
                req.file.clone()
            };
            if Path::new(&filename).extension().is_none() {
                filename.push_str(".pem");
            }
            std::fs::write(&filename, key.to_pem()?)?;
            println!(" -> {filename}");
        } else {
            output::print_public_key(&key);
        }
    }
    Ok(())
}

fn check_hex(value: &str, bytes: usize, what: &str) -> Result<()> {
    if value.len() != bytes * 2 || hex::decode(value).is_err() {
        return Err(Error::usage(format!(
            "{what} must be a {bytes} bytes hex string value ({} characters)",
            bytes * 2
        )));
    }
    Ok(())
}

fn parse_fingerprint(value: &str) -> Result<[u8; 20]> {
    let bytes = hex::decode(value)
        .map_err(|_| Error::usage(format!("Invalid fingerprint: {value}")))?;
    bytes
        .try_into()
        .map_err(|_| Error::usage("Each fingerprint is 20 hex bytes long"))
}

/// Split a `SIG:DEC:AUT` argument, or apply a single value to the
/// selected key when `--key-type` narrows the scope.
fn per_role<V>(
    value: &str,
    key_type: Option<KeyRole>,
    parse: impl Fn(&str) -> Result<V>,
) -> Result<Vec<(KeyRole, V)>> {
    if let Some(role) = key_type {
        return Ok(vec![(role, parse(value)?)]);
    }
    let parts: Vec<&str> = value.split(':').collect();
    let [sig, dec, aut] = parts[..] else {
        return Err(Error::usage(format!(
            "Wrong arguments, expected SIG:DEC:AUT: {value}"
        )));
    };
    Ok(vec![
        (KeyRole::Signature, parse(sig)?),
        (KeyRole::Decryption, parse(dec)?),
        (KeyRole::Authentication, parse(aut)?),
    ])
}
