//! Command-line tool for managing OpenPGP cards

use std::net::SocketAddr;

use clap::Parser;
use pgpcard::OpenPgpCard;
use pgpcard_apdu_core::Error as ApduError;
use pgpcard_apdu_transport_pcsc::PcscDeviceManager;
use pgpcard_apdu_transport_tcp::TcpTransport;
use tracing_subscriber::EnvFilter;

mod actions;
mod output;

use actions::{KeyAction, Request};

/// Emulator endpoint used when the reader is named "speculos".
const SPECULOS_ADDRESS: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
    9999,
);

#[derive(Parser)]
#[command(name = "pgpcard", version, about = "Manage the OpenPGP card application")]
pub(crate) struct Cli {
    /// Get and display card information
    #[arg(long)]
    pub(crate) info: bool,

    /// PC/SC reader name filter, or 'speculos' for the TCP debug transport
    #[arg(long, default_value = "Ledger")]
    pub(crate) reader: String,

    /// Log APDU exchanges
    #[arg(long)]
    pub(crate) apdu: bool,

    /// Select slot (1 to 3)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub(crate) slot: Option<u8>,

    /// Reset the application (all data will be erased)
    #[arg(long)]
    pub(crate) reset: bool,

    /// Delegate PIN validation to the reader pin-pad
    #[arg(long)]
    pub(crate) pinpad: bool,

    /// Admin PIN (required unless --pinpad is used)
    #[arg(long, value_name = "PIN")]
    pub(crate) adm_pin: Option<String>,

    /// User PIN (required unless --pinpad is used)
    #[arg(long, value_name = "PIN")]
    pub(crate) user_pin: Option<String>,

    /// Change the User PIN
    #[arg(long, value_name = "PIN")]
    pub(crate) new_user_pin: Option<String>,

    /// Change the Admin PIN
    #[arg(long, value_name = "PIN")]
    pub(crate) new_adm_pin: Option<String>,

    /// Update the PW1 Resetting Code (8 hex characters)
    #[arg(long, conflicts_with = "reset_pw1")]
    pub(crate) reset_code: Option<String>,

    /// Reset the User PIN to the given value through a verified Admin PIN
    #[arg(long, value_name = "PIN")]
    pub(crate) reset_pw1: Option<String>,

    /// Update the AID serial number (8 hex characters)
    #[arg(long)]
    pub(crate) serial: Option<String>,

    /// Update the salutation (Male or Female)
    #[arg(long)]
    pub(crate) salutation: Option<String>,

    /// Update the cardholder name
    #[arg(long)]
    pub(crate) name: Option<String>,

    /// Update the public key URL
    #[arg(long)]
    pub(crate) url: Option<String>,

    /// Update the login data
    #[arg(long)]
    pub(crate) login: Option<String>,

    /// Update the language preferences
    #[arg(long)]
    pub(crate) lang: Option<String>,

    /// Select a key (SIG, DEC or AUT; default is all keys)
    #[arg(long)]
    pub(crate) key_type: Option<String>,

    /// Generate a key pair, read or export the public key
    #[arg(long, value_enum)]
    pub(crate) key_action: Option<KeyAction>,

    /// Fingerprints for the selected key, or SIG:DEC:AUT for all keys
    /// (40 hex characters each)
    #[arg(long, value_name = "SIG:DEC:AUT")]
    pub(crate) set_fingerprints: Option<String>,

    /// Template for the selected key, or SIG:DEC:AUT for all keys
    /// (rsa2048, rsa3072, nistp256, ed25519, cv25519)
    #[arg(long, value_name = "SIG:DEC:AUT")]
    pub(crate) set_templates: Option<String>,

    /// Regenerate all keys from the device seed
    #[arg(long)]
    pub(crate) seed_key: bool,

    /// File for public key export, --backup and --restore
    #[arg(long, default_value = "pubkey")]
    pub(crate) file: String,

    /// Save the card configuration to --file
    #[arg(long, conflicts_with = "restore")]
    pub(crate) backup: bool,

    /// Replay a configuration saved with --backup onto the card
    #[arg(long)]
    pub(crate) restore: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.apdu);

    if let Err(err) = run(&cli) {
        match err.status_word() {
            Some(sw) => eprintln!("\n### Error {:x}: {}\n", sw.to_u16(), sw.description()),
            None => eprintln!("\n### Error: {err}\n"),
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), pgpcard::Error> {
    // All argument validation happens before the card is touched.
    let request = Request::from_cli(cli)?;

    println!("Connect to card '{}'...", cli.reader);
    if cli.reader == "speculos" {
        let transport = TcpTransport::connect(SPECULOS_ADDRESS).map_err(ApduError::from)?;
        actions::execute(&mut OpenPgpCard::new(transport), &request)
    } else {
        let manager = PcscDeviceManager::new().map_err(ApduError::from)?;
        let transport = manager.open_matching(&cli.reader).map_err(ApduError::from)?;
        actions::execute(&mut OpenPgpCard::new(transport), &request)
    }
}

fn init_logging(apdu: bool) {
    let filter = if apdu {
        EnvFilter::new("info,pgpcard_apdu_core=trace,pgpcard_apdu_transport_pcsc=trace,pgpcard_apdu_transport_tcp=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
