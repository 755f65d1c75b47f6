use clap::{Parser, Subcommand};
use plyusdz::{BatchConvertArgs, ConvertArgs};

/// Convert Gaussian splat PLY files to USDZ packages
#[derive(Debug, Parser)]
#[clap(name = "plyusdz", version, author, about, infer_subcommands = true)]
pub struct RootArgs {
    #[clap(subcommand)]
    command: SplatCommand,

    /// Log debug output (overridden by RUST_LOG)
    #[clap(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum SplatCommand {
    /// Convert every PLY file under a directory, mirroring its layout.
    Batch(BatchConvertArgs),
    /// Convert a single PLY file.
    Convert(ConvertArgs),
}

fn main() {
    let args = RootArgs::parse();
    plyusdz::init_logging(args.verbose);

    let result = match args.command {
        SplatCommand::Batch(args) => plyusdz::commands::splat::batch::execute(args),
        SplatCommand::Convert(args) => plyusdz::commands::splat::convert::execute(args),
    };

    if let Err(e) = result {
        plyusdz::handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn batch_flags_parse() {
        let args = RootArgs::try_parse_from([
            "plyusdz",
            "batch",
            "in",
            "out",
            "--workers",
            "4",
            "--force-zero-order-sh=false",
            "--dry-run",
        ])
        .unwrap();
        match args.command {
            SplatCommand::Batch(b) => {
                assert_eq!(b.workers.map(|w| w.get()), Some(4));
                assert_eq!(b.force_zero_order_sh, Some(false));
                assert!(b.dry_run);
                assert_eq!(b.overwrite, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn bare_zero_order_flag_means_true() {
        let args = RootArgs::try_parse_from([
            "plyusdz",
            "batch",
            "in",
            "out",
            "--force-zero-order-sh",
            "--overwrite",
        ])
        .unwrap();
        match args.command {
            SplatCommand::Batch(b) => {
                assert_eq!(b.force_zero_order_sh, Some(true));
                assert_eq!(b.overwrite, Some(true));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn space_separated_bool_values_parse() {
        let args = RootArgs::try_parse_from([
            "plyusdz",
            "batch",
            "in",
            "out",
            "--overwrite",
            "false",
            "--force-zero-order-sh",
            "false",
        ])
        .unwrap();
        match args.command {
            SplatCommand::Batch(b) => {
                assert_eq!(b.overwrite, Some(false));
                assert_eq!(b.force_zero_order_sh, Some(false));
                assert_eq!(b.input_dir, std::path::PathBuf::from("in"));
                assert_eq!(b.output_dir, std::path::PathBuf::from("out"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn convert_accepts_boolish_words() {
        let args = RootArgs::try_parse_from([
            "plyusdz",
            "convert",
            "scene.ply",
            "--force-zero-order-sh",
            "no",
        ])
        .unwrap();
        match args.command {
            SplatCommand::Convert(c) => assert_eq!(c.force_zero_order_sh, Some(false)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn non_bool_flag_value_is_rejected() {
        let result =
            RootArgs::try_parse_from(["plyusdz", "batch", "in", "out", "--overwrite", "maybe"]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(RootArgs::try_parse_from(["plyusdz", "batch", "in", "out", "-w", "0"]).is_err());
    }
}
