//! secp256k1 party key generator for p2pcdn sessions.
//!
//! This utility generates a party key and outputs:
//! - The party address (keccak of the uncompressed public key)
//! - The uncompressed public key
//! - The reveal-encryption public point consumers hand to `consume`
//! - The secret key, saved to a file
//!
//! Usage:
//!   cargo run --bin p2pcdn-keygen [output-dir] [seed-phrase]
//!
//! With a seed phrase the key is derived deterministically, which is handy for
//! reproducible simulations.

use k256::ecdsa::SigningKey;
use p2pcdn_escrow::crypto::keccak256;
use p2pcdn_escrow::crypto::signature::{address_of, signing_key_from_secret};
use p2pcdn_escrow::crypto::SecretKey;
use std::env;
use std::fs;
use std::path::Path;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    println!("secp256k1 party key generator for p2pcdn\n");

    // Get output directory and optional seed from args
    let args: Vec<String> = env::args().collect();
    let output_dir = if args.len() > 1 {
        Path::new(&args[1]).to_path_buf()
    } else {
        env::current_dir()?
    };
    let seed = args.get(2);

    fs::create_dir_all(&output_dir)?;

    let key = match seed {
        Some(phrase) => {
            println!("Deriving key from seed phrase...");
            signing_key_from_secret(&keccak256(phrase.as_bytes()))?
        }
        None => {
            println!("Generating random key...");
            SigningKey::random(&mut rand::rngs::OsRng)
        }
    };

    let secret = key.to_bytes();
    let public = key.verifying_key().to_encoded_point(false);
    let address = address_of(key.verifying_key());
    let reveal_key = SecretKey::from_seed(&secret)
        .ok_or_else(|| color_eyre::eyre::eyre!("degenerate reveal key"))?
        .public_point();

    println!("  Address:     {address}");
    println!("  Public key:  0x{}", hex::encode(public.as_bytes()));
    println!(
        "  Reveal key:  0x{}{}",
        hex::encode(reveal_key.x),
        hex::encode(reveal_key.y)
    );

    // Save secret key to file (KEEP THIS SECURE!)
    let sk_path = output_dir.join(format!("{address}.secret"));
    fs::write(&sk_path, hex::encode(secret))?;
    println!("\nSecret key saved to: {}", sk_path.display());
    println!("  WARNING: Keep this file secure! It signs receipts and chunks.");
    println!(
        "Generated: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}
