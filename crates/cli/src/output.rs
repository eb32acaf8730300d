//! Console rendering of the card report and public keys

use pgpcard::state::DATE_FORMAT;
use pgpcard::{KeyRole, OpenPgpCard, PublicKey, report};
use pgpcard_apdu_core::CardTransport;

const LINE: &str = "===============";

fn section(title: &str) {
    println!("{LINE} {title} {LINE}");
}

fn rows(rows: &[(&'static str, String)]) {
    for (label, value) in rows {
        println!(" - {label:20}: {value}");
    }
}

/// Print the full card report from the current state snapshot
pub(crate) fn print_report<T: CardTransport>(card: &OpenPgpCard<T>) {
    let state = card.state();

    section("Application Identifier");
    for (label, value) in report::aid(state) {
        if label == "AID" {
            println!(" # {label:20}: {value}");
        } else {
            println!("   - {label:18}: {value}");
        }
    }
    section("Historical Bytes");
    rows(&report::historical_bytes(state));
    section("Max Extended Length");
    rows(&report::extended_length(state));
    section("PIN Info");
    rows(&report::passwords(state));
    section("Extended Capabilities");
    rows(&report::extended_capabilities(state));
    section("Hardware Features");
    rows(&report::hardware(state));

    section("User Info");
    println!(" - {:20}: {}", "Name", state.name);
    println!(" - {:20}: {}", "Login", state.login);
    println!(" - {:20}: {}", "URL", state.url);
    println!(" - {:20}: {}", "Salutation", state.salutation);
    println!(" - {:20}: {}", "Lang", state.lang);

    section("Slots Info");
    rows(&report::slots(card.slot_config(), card.slot_current()));

    section("Keys Info");
    println!(" - {:20}: {}", "CDS counter", state.digital_counter);
    println!(" - {:20}: 0x{:06x}", "RSA Pub Exponent", state.rsa_pub_exp);
    for role in KeyRole::ALL {
        let key = state.key(role);
        println!(" # {role}:");
        println!("   - {:18}: {}", "UIF", report::uif(key.uif));
        println!(
            "   - {:18}: {}",
            "Fingerprint",
            key.fingerprint_hex().unwrap_or_else(|| "N/A".into())
        );
        println!(
            "   - {:18}: {}",
            "CA fingerprint",
            key.ca_fingerprint_hex().unwrap_or_else(|| "N/A".into())
        );
        println!("   - {:18}: {}", "Creation date", key.creation_date_string());
        println!("   - {:18}: {}", "Attribute", report::attributes(key));
        println!("   - {:18}: {}", "Certificate", key.certificate);
        println!("   - Key:");
        for (label, value) in report::key_blob(&key.key_material) {
            println!("     * {label:16}: {value}");
        }
    }
}

/// Print the public material returned by a key operation
pub(crate) fn print_public_key(key: &PublicKey) {
    match key {
        PublicKey::Rsa {
            bit_length,
            modulus,
            exponent,
            created,
            fingerprint,
        } => {
            println!(" - {:13}: RSA-{bit_length}", "Algorithm");
            println!(" - {:13}: 0x{}", "Public Exp", hex::encode(exponent));
            println!(" - {:13}: {}", "Modulus", hex::encode(modulus));
            println!(" - {:13}: {}", "Fingerprint", hex::encode(fingerprint));
            println!(
                " - {:13}: {}",
                "Creation date",
                created.format(DATE_FORMAT).unwrap_or_default()
            );
        }
        PublicKey::Ec { algorithm, oid } => {
            println!(" - {:13}: {algorithm}", "Algorithm");
            println!(" - {:13}: {}", "OID", hex::encode(oid));
        }
    }
}
