// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use keyattestation::chain::AttestationChain;
use keyattestation::ext::{KeyDescription, ProvisioningInfoMap, PROVISIONING_INFO_EXTENSION_OID};
use keyattestation::log::NopLog;
use keyattestation::store::{MemoRevocationList, MemoTrustAnchorStore};
use keyattestation::verifier::{ChallengeMatcher, SystemClock, Verifier};
use openssl::x509::X509;
use std::error::Error;
use std::fs;

#[derive(Parser)]
enum KeyAttestationCli {
    Verify(VerifyArgs),
    Print(PrintArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Verify the supplied attestation chain against the trust anchor \
    store and print the outcome")]
struct VerifyArgs {
    #[arg(short, long, default_value = "chain.pem")]
    chain: String,

    #[arg(short, long, default_value = "tastore.json")]
    tastore: String,

    /// Revocation status list; nothing is treated as revoked when omitted
    #[arg(short, long)]
    revocation: Option<String>,

    /// Expected challenge (UTF-8); skip the challenge check when omitted
    #[arg(short = 'x', long)]
    challenge: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Pretty-print the attestation extension of the supplied chain \
    without verifying it")]
struct PrintArgs {
    #[arg(short, long, default_value = "chain.pem")]
    chain: String,
}

fn main() {
    env_logger::init();

    match KeyAttestationCli::parse() {
        KeyAttestationCli::Verify(args) => match verify(&args) {
            Ok(()) => {}
            Err(e) => eprintln!("verification failed: {e}"),
        },
        KeyAttestationCli::Print(args) => match print(&args) {
            Ok(()) => {}
            Err(e) => eprintln!("printing failed: {e}"),
        },
    }
}

fn read_chain(path: &str) -> Result<Vec<Vec<u8>>, Box<dyn Error>> {
    let pem = fs::read(path)?;
    let certs = X509::stack_from_pem(&pem)?;
    let mut der = Vec::with_capacity(certs.len());
    for cert in &certs {
        der.push(cert.to_der()?);
    }
    Ok(der)
}

fn verify(args: &VerifyArgs) -> Result<(), Box<dyn Error>> {
    let chain = read_chain(&args.chain)?;

    let anchors = MemoTrustAnchorStore::new();
    anchors.load_json(&fs::read_to_string(&args.tastore)?)?;

    let revocations = MemoRevocationList::new();
    if let Some(path) = &args.revocation {
        revocations.load_json(&fs::read_to_string(path)?)?;
    }

    let verifier = Verifier::new(anchors, revocations, SystemClock, Default::default())?;

    let matcher = args
        .challenge
        .as_ref()
        .map(|c| ChallengeMatcher::new(c.as_bytes()));
    let result = verifier.verify(
        &chain,
        matcher
            .as_ref()
            .map(|m| m as &dyn keyattestation::verifier::ChallengeChecker),
        None,
    );

    println!("{result:#?}");
    Ok(())
}

fn print(args: &PrintArgs) -> Result<(), Box<dyn Error>> {
    let der = read_chain(&args.chain)?;
    let chain = AttestationChain::new(&der)?;

    let extension = chain
        .leaf()
        .extension(&keyattestation::ext::ATTESTATION_EXTENSION_OID)
        .ok_or("attestation extension not found")?;
    let key_description = KeyDescription::from_der(extension.extn_value.as_bytes(), &NopLog)?;
    println!("provisioning method: {:?}", chain.provisioning_method());
    println!("{key_description:#?}");

    if let Some(extension) = chain
        .attestation_cert()
        .extension(&PROVISIONING_INFO_EXTENSION_OID)
    {
        let info = ProvisioningInfoMap::from_cbor(extension.extn_value.as_bytes())?;
        println!("{info:#?}");
    }
    Ok(())
}
