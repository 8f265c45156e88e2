//! CLI argument parsing tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn parse_download_all() {
    let cli = Cli::try_parse_from([
        "adm",
        "download-all",
        "lists/base.json",
        "lists/extra.json",
        "-o",
        "archives",
        "--jobs",
        "8",
        "--limit",
        "100",
    ])
    .unwrap();
    match cli.command {
        CliCommand::DownloadAll {
            manifests,
            output,
            jobs,
            limit,
        } => {
            assert_eq!(
                manifests,
                vec![
                    PathBuf::from("lists/base.json"),
                    PathBuf::from("lists/extra.json")
                ]
            );
            assert_eq!(output, PathBuf::from("archives"));
            assert_eq!(jobs, Some(8));
            assert_eq!(limit, Some(100));
        }
        other => panic!("wrong verb: {other:?}"),
    }
}

#[test]
fn download_all_requires_a_manifest() {
    assert!(Cli::try_parse_from(["adm", "download-all", "-o", "out"]).is_err());
}

#[test]
fn download_all_defaults_are_unset() {
    let cli = Cli::try_parse_from(["adm", "download-all", "m.json", "-o", "out"]).unwrap();
    match cli.command {
        CliCommand::DownloadAll { jobs, limit, .. } => {
            assert!(jobs.is_none());
            assert!(limit.is_none());
        }
        other => panic!("wrong verb: {other:?}"),
    }
}

#[test]
fn parse_hash_dir() {
    let cli = Cli::try_parse_from(["adm", "hash-dir", "downloads"]).unwrap();
    match cli.command {
        CliCommand::HashDir { dir } => assert_eq!(dir, PathBuf::from("downloads")),
        other => panic!("wrong verb: {other:?}"),
    }
}

#[test]
fn parse_verify() {
    let cli = Cli::try_parse_from(["adm", "verify", "m.json", "downloads"]).unwrap();
    match cli.command {
        CliCommand::Verify { manifest, dir } => {
            assert_eq!(manifest, PathBuf::from("m.json"));
            assert_eq!(dir, PathBuf::from("downloads"));
        }
        other => panic!("wrong verb: {other:?}"),
    }
}
