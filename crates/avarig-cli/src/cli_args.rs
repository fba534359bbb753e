//! CLI argument definitions for the Avarig command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use std::path::PathBuf;

use avarig_data::{Gender, JointType, RigType};
use avarig_engine::RigProps;
use clap::{Args, Parser, Subcommand, ValueEnum};

use avarig_cli::commands::anim::AnimFormat;
use avarig_cli::overrides::{parse_gender, parse_override, SliderOverride};

/// Avarig - Avatar rigging toolkit
#[derive(Parser)]
#[command(name = "avarig")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Load a reference skeleton and print bone counts
    Inspect {
        #[command(flatten)]
        rig: RigArgs,

        /// Also list every bone with its rest head
        #[arg(long)]
        bones: bool,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List root sliders grouped by edit group
    Sliders {
        /// Only list this edit group
        #[arg(short, long)]
        group: Option<String>,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Build an avatar, apply a shape, and print the placed bones
    Shape {
        #[command(flatten)]
        rig: RigArgs,

        /// Shape XML to apply
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Slider override in UI units, e.g. height_33=75 (repeatable)
        #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_override)]
        sets: Vec<SliderOverride>,

        /// Avatar gender (female, male)
        #[arg(long, value_parser = parse_gender)]
        gender: Option<Gender>,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a shape XML from default values plus overrides
    ExportShape {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Shape name written into the file
        #[arg(long, default_value = "Avatar")]
        name: String,

        /// Slider override in UI units, e.g. height_33=75 (repeatable)
        #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_override)]
        sets: Vec<SliderOverride>,

        /// Avatar gender (female, male)
        #[arg(long, value_parser = parse_gender)]
        gender: Option<Gender>,
    },

    /// Encode a JSON clip description to .anim or .bvh
    Anim {
        /// JSON clip description
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,

        /// Output format, overriding the extension
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// BVH frames per second
        #[arg(long, default_value_t = 30.0)]
        fps: f32,

        /// Do not write root translation keys into BVH frames
        #[arg(long)]
        no_translations: bool,

        #[command(flatten)]
        rig: RigArgs,
    },
}

/// Skeleton selection shared by several commands.
#[derive(Args, Debug, Clone)]
pub(crate) struct RigArgs {
    /// Skeleton generation
    #[arg(long, value_enum, default_value_t = RigArg::Basic)]
    pub rig: RigArg,

    /// Joint location set
    #[arg(long, value_enum, default_value_t = JointArg::Pivot)]
    pub joints: JointArg,
}

impl RigArgs {
    pub fn props(&self) -> RigProps {
        RigProps {
            rig_type: match self.rig {
                RigArg::Basic => RigType::Basic,
                RigArg::Extended => RigType::Extended,
            },
            joint_type: match self.joints {
                JointArg::Pos => JointType::Pos,
                JointArg::Pivot => JointType::Pivot,
            },
            ..RigProps::default()
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RigArg {
    Basic,
    Extended,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JointArg {
    Pos,
    Pivot,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormatArg {
    Anim,
    Bvh,
}

impl From<FormatArg> for AnimFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Anim => AnimFormat::Anim,
            FormatArg::Bvh => AnimFormat::Bvh,
        }
    }
}
