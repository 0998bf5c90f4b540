use clap::{Arg, ArgAction, Command};
use log::debug;
use std::time::Instant;

pub const DEFAULT_CONFIG_PATH: &str = "config/barcam.yaml";

pub fn build_cli() -> Command {
    debug!("⚙️ Building CLI interface...");
    let start_time = Instant::now();
    let cmd = Command::new("barcam")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Marker-triggered packing-station recorder with pre/post-roll and tracking upload.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom configuration file")
                .default_value(DEFAULT_CONFIG_PATH)
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
        )
        .subcommand(
            Command::new("run")
                .about("Runs the recorder; markers are read line by line from stdin")
                .arg(Arg::new("test-pattern").long("test-pattern").help("Use a synthetic frame source instead of the configured stream").action(ArgAction::SetTrue))
                .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Output directory for recordings").action(ArgAction::Set))
        )
        .subcommand(
            Command::new("register")
                .about("Registers (or updates) this workstation with the tracking server and saves its id")
                .arg(Arg::new("name").long("name").value_name("NAME").help("Workstation name to register").action(ArgAction::Set))
        )
        .subcommand(
            Command::new("upload")
                .about("Uploads a retained recording for a tracking id and deletes it on success")
                .arg(Arg::new("tracking-id").long("tracking-id").value_name("ID").required(true).help("Tracking record the video belongs to").action(ArgAction::Set))
                .arg(Arg::new("file").long("file").value_name("PATH").required(true).help("Recording to upload").action(ArgAction::Set))
        );
    debug!("✅ CLI interface built in {:?}", start_time.elapsed());
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_test_pattern_and_output() {
        let matches = build_cli()
            .try_get_matches_from(["barcam", "-d", "run", "--test-pattern", "-o", "/tmp/out"])
            .unwrap();
        assert!(matches.get_flag("debug"));
        assert_eq!(matches.get_one::<String>("config").map(String::as_str), Some(DEFAULT_CONFIG_PATH));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert!(sub.get_flag("test-pattern"));
        assert_eq!(sub.get_one::<String>("output").map(String::as_str), Some("/tmp/out"));
    }

    #[test]
    fn upload_requires_both_arguments() {
        assert!(build_cli().try_get_matches_from(["barcam", "upload", "--file", "a.mp4"]).is_err());
        assert!(build_cli()
            .try_get_matches_from(["barcam", "upload", "--file", "a.mp4", "--tracking-id", "9"])
            .is_ok());
    }
}
