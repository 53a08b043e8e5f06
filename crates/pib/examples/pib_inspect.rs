//! PIB Inspection Example
//!
//! Opens the PIB named by a config file and prints every identity, key and
//! certificate, marking the defaults.
//!
//! Run with: cargo run --example pib_inspect -p aethercore-pib -- [config.toml]
//!
//! Without a config file the default SQLite location is used. Pass
//! `--demo` instead to populate an in-memory PIB first.

use aethercore_core::{logging, naming, Certificate, Name};
use aethercore_pib::{open_pib, PibConfig, PibError, PibImpl, PibResult};
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let arg = std::env::args().nth(1);

    let config = match arg.as_deref() {
        Some("--demo") => PibConfig::memory(),
        Some(path) => PibConfig::from_file(path)?,
        None => PibConfig::default(),
    };
    logging::init(&config.logging)?;

    let mut pib = open_pib(&config.locator)?;
    info!(locator = %config.locator, "PIB opened");

    if arg.as_deref() == Some("--demo") {
        populate_demo(pib.as_mut())?;
    }

    print_pib(pib.as_ref())?;
    Ok(())
}

fn populate_demo(pib: &mut dyn PibImpl) -> anyhow::Result<()> {
    for (identity, keys) in [("/aethercore/node/alpha", 2), ("/aethercore/node/bravo", 1)] {
        let identity: Name = identity.parse()?;
        for i in 1..=keys {
            let key_name = naming::key_name(&identity, format!("ksk-{}", i));
            let public_key = format!("public key of {}", key_name).into_bytes();
            let cert_name = naming::certificate_name(&key_name, "self", "v1");
            let encoded = format!("certificate {}", cert_name).into_bytes();
            pib.add_certificate(&Certificate::new(cert_name, public_key, encoded)?)?;
        }
    }
    pib.set_tpm_locator("tpm-memory:")?;
    Ok(())
}

fn print_pib(pib: &dyn PibImpl) -> PibResult<()> {
    println!("=== PIB ({}) ===\n", pib.scheme());

    match pib.tpm_locator() {
        Ok(locator) => println!("TPM locator: {}", locator),
        Err(PibError::TpmLocatorNotSet) => println!("TPM locator: <not set>"),
        Err(e) => return Err(e),
    }

    let default_identity = optional(pib.default_identity())?;
    let identities = pib.identities()?;
    if identities.is_empty() {
        println!("No identities");
        return Ok(());
    }

    for identity in identities {
        println!(
            "\n{} {}",
            marker(default_identity.as_ref() == Some(&identity)),
            identity
        );

        let default_key = optional(pib.default_key_of_identity(&identity))?;
        for key_name in pib.keys_of_identity(&identity)? {
            let bits = pib.key_bits(&key_name)?;
            println!(
                "  {} {} ({} bytes)",
                marker(default_key.as_ref() == Some(&key_name)),
                key_name,
                bits.len()
            );

            let default_cert = optional(pib.default_certificate_of_key(&key_name))?
                .map(|cert| cert.name().clone());
            for cert_name in pib.certificates_of_key(&key_name)? {
                println!(
                    "    {} {}",
                    marker(default_cert.as_ref() == Some(&cert_name)),
                    cert_name
                );
            }
        }
    }
    Ok(())
}

/// Turn the "no default" errors into `None`; anything else is a failure.
fn optional<T>(result: PibResult<T>) -> PibResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            PibError::NoDefaultIdentity
            | PibError::NoDefaultKey { .. }
            | PibError::NoDefaultCertificate { .. },
        ) => Ok(None),
        Err(e) => {
            warn!(error = %e, "PIB read failed");
            Err(e)
        }
    }
}

fn marker(is_default: bool) -> &'static str {
    if is_default {
        "*"
    } else {
        "-"
    }
}
