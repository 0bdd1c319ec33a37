use crate::cli::InputArgs;
use crate::config::ligand_list_options;
use crate::error::{CliError, Result};
use ligand_triage::core::io::ligands;
use ligand_triage::core::models::candidate::Candidate;
use tracing::info;

pub mod batch;
pub mod screen;

/// Reads the ligand list named by `args`, honouring header, delimiter and limit options.
fn load_candidates(args: &InputArgs) -> Result<Vec<Candidate>> {
    let options = ligand_list_options(args)?;
    info!("Loading ligand list from {:?}", &args.input);
    let candidates =
        ligands::read_from_path(&args.input, &options).map_err(|e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        })?;
    if candidates.is_empty() {
        return Err(CliError::Argument(format!(
            "Ligand list '{}' contains no candidates",
            args.input.display()
        )));
    }
    Ok(candidates)
}
