use std::fmt;
use std::path::{Path, PathBuf};

/// A single ligand being screened against the target.
///
/// The `index` is the candidate's position in the input list. It is stable for the whole
/// run and is what makes the candidate's scratch directory unique, since ligand names in
/// real libraries are not guaranteed to be.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub index: usize,
    pub name: String,
    pub smiles: String,
}

impl Candidate {
    pub fn new(index: usize, name: impl Into<String>, smiles: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            smiles: smiles.into(),
        }
    }

    /// Name of the candidate's exclusive scratch directory, e.g. `000042_aspirin`.
    pub fn work_dir_name(&self) -> String {
        let sanitized: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if sanitized.is_empty() {
            format!("{:06}", self.index)
        } else {
            format!("{:06}_{}", self.index, sanitized)
        }
    }

    pub fn work_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.work_dir_name())
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} '{}'", self.index, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_name_is_prefixed_with_padded_index() {
        let candidate = Candidate::new(42, "aspirin", "CC(=O)OC1=CC=CC=C1C(=O)O");
        assert_eq!(candidate.work_dir_name(), "000042_aspirin");
    }

    #[test]
    fn work_dir_name_replaces_path_hostile_characters() {
        let candidate = Candidate::new(3, "ZINC/123 (R)", "C");
        assert_eq!(candidate.work_dir_name(), "000003_ZINC_123__R_");
    }

    #[test]
    fn work_dir_name_falls_back_to_index_for_empty_names() {
        let candidate = Candidate::new(7, "", "C");
        assert_eq!(candidate.work_dir_name(), "000007");
    }

    #[test]
    fn duplicate_names_map_to_distinct_directories() {
        let a = Candidate::new(0, "lig", "C");
        let b = Candidate::new(1, "lig", "CC");
        let root = Path::new("/tmp/out");
        assert_ne!(a.work_dir(root), b.work_dir(root));
    }
}
