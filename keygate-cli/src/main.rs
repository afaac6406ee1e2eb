//! Keygate offline license tool.
//!
//! Usage:
//!   keygate keygen --priv private.pem --pub public.pem
//!   keygate issue --hwid HW-1 --days 365 --priv private.pem --out license.lic
//!   keygate verify --lic license.lic --pub public.pem --hwid HW-1
//!
//! Issuance is fully offline; the private key never leaves this machine.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use keygate_license::{
    LicenseArtifact, generate_signing_key, issue_license, load_signing_key, load_verifying_key,
    save_keypair,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(about = "Keygate offline license tool")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an Ed25519 key pair as PEM files
    Keygen {
        /// Output path for the private key
        #[arg(long = "priv", default_value = "private.pem")]
        private_key: PathBuf,

        /// Output path for the public key
        #[arg(long = "pub", default_value = "public.pem")]
        public_key: PathBuf,
    },

    /// Issue a signed license artifact
    Issue {
        /// Hardware id to bind, empty for a generic license
        #[arg(long, default_value = "")]
        hwid: String,

        /// Validity in days
        #[arg(long, default_value = "365")]
        days: i64,

        /// Feature to include (repeatable)
        #[arg(long = "feature", default_value = "full")]
        features: Vec<String>,

        /// Private key PEM file
        #[arg(long = "priv", default_value = "private.pem")]
        private_key: PathBuf,

        /// Output license file
        #[arg(long, default_value = "license.lic")]
        out: PathBuf,
    },

    /// Verify a license artifact against a public key
    Verify {
        /// License artifact file
        #[arg(long = "lic", default_value = "license.lic")]
        license: PathBuf,

        /// Public key PEM file
        #[arg(long = "pub", default_value = "public.pem")]
        public_key: PathBuf,

        /// Observed hardware id (empty matches only unbound licenses)
        #[arg(long, default_value = "")]
        hwid: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Keygen {
            private_key,
            public_key,
        } => {
            if private_key.exists() {
                bail!("refusing to overwrite existing key {}", private_key.display());
            }
            let key = generate_signing_key();
            save_keypair(&key, &private_key, &public_key).context("writing key pair")?;
            println!("Wrote private key: {}", private_key.display());
            println!("Wrote public key:  {}", public_key.display());
        }

        Command::Issue {
            hwid,
            days,
            features,
            private_key,
            out,
        } => {
            if days <= 0 {
                bail!("validity must be at least one day");
            }
            let key = load_signing_key(&private_key).context("loading private key")?;
            let artifact = issue_license(&hwid, days, features, &key).context("signing license")?;
            artifact
                .write_atomic(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("Created license file: {}", out.display());
        }

        Command::Verify {
            license,
            public_key,
            hwid,
        } => {
            let key = load_verifying_key(&public_key).context("loading public key")?;
            let artifact = LicenseArtifact::read(&license)
                .with_context(|| format!("reading {}", license.display()))?;
            let payload = artifact.verify(&key, &hwid)?;
            println!("License OK");
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}
