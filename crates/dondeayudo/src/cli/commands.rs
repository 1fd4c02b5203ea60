//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::point::{Category, PublicationState};

/// Sync command arguments.
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Points command arguments.
#[derive(Debug, Args)]
pub struct PointsCommand {
    /// Filter by display type, subtype or category ("todos" for all)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub point_type: Option<String>,

    /// Filter by category
    #[arg(long, value_enum)]
    pub category: Option<CategoryArg>,

    /// Maximum number of points to show
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Cache commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Remove the cached snapshot
    Clear,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Admin commands; require `api.admin_token`.
#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List points in any state
    List {
        /// Filter by publication state
        #[arg(short, long, value_enum)]
        state: Option<StateArg>,

        /// Filter by category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,

        /// Filter by subtype
        #[arg(long)]
        subtype: Option<String>,

        /// Filter by city
        #[arg(long)]
        city: Option<String>,

        /// Page number
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Page size (the backend caps it at 100)
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Publish a point
    Verify {
        /// Point id
        id: String,
    },

    /// Reject a point
    Reject {
        /// Point id
        id: String,

        /// Reason, stored in the internal notes
        #[arg(short, long)]
        reason: String,
    },

    /// Change the publication state of a point
    State {
        /// Point id
        id: String,

        /// New state
        #[arg(value_enum)]
        state: StateArg,
    },

    /// Delete a point
    Delete {
        /// Point id
        id: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Create a point from a JSON file
    Create {
        /// JSON file with the new point in backend field names
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// Informational points
    Informacion,
    /// Supply depots
    Acopio,
    /// Help requests
    #[value(name = "solicitud_ayuda")]
    SolicitudAyuda,
    /// Emergency reports
    Sos,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Informacion => Self::Information,
            CategoryArg::Acopio => Self::SupplyDepot,
            CategoryArg::SolicitudAyuda => Self::HelpRequest,
            CategoryArg::Sos => Self::Emergency,
        }
    }
}

/// Publication state argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    /// Draft
    Borrador,
    /// Pending review
    Revision,
    /// Published
    Publicado,
    /// Hidden
    Oculto,
    /// Rejected
    Rechazado,
}

impl From<StateArg> for PublicationState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Borrador => Self::Draft,
            StateArg::Revision => Self::PendingReview,
            StateArg::Publicado => Self::Published,
            StateArg::Oculto => Self::Hidden,
            StateArg::Rechazado => Self::Rejected,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_arg_conversion() {
        assert_eq!(Category::from(CategoryArg::Informacion), Category::Information);
        assert_eq!(Category::from(CategoryArg::Acopio), Category::SupplyDepot);
        assert_eq!(Category::from(CategoryArg::SolicitudAyuda), Category::HelpRequest);
        assert_eq!(Category::from(CategoryArg::Sos), Category::Emergency);
    }

    #[test]
    fn test_state_arg_conversion() {
        for (arg, state) in [
            (StateArg::Borrador, PublicationState::Draft),
            (StateArg::Revision, PublicationState::PendingReview),
            (StateArg::Publicado, PublicationState::Published),
            (StateArg::Oculto, PublicationState::Hidden),
            (StateArg::Rechazado, PublicationState::Rejected),
        ] {
            assert_eq!(PublicationState::from(arg), state);
        }
    }

    #[test]
    fn test_state_arg_names_match_wire_values() {
        for arg in StateArg::value_variants() {
            let name = arg.to_possible_value().unwrap();
            assert_eq!(name.get_name(), PublicationState::from(*arg).as_str());
        }
    }

    #[test]
    fn test_category_arg_names_match_wire_values() {
        for arg in CategoryArg::value_variants() {
            let name = arg.to_possible_value().unwrap();
            assert_eq!(name.get_name(), Category::from(*arg).as_str());
        }
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }
}
