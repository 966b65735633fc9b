//! Building the work list.

use crate::core::errors::{SegError, SegResult};
use crate::domain::CaseDescriptor;
use crate::pipeline::saver::OutputNaming;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Returns true for `.nii` and `.nii.gz` files.
pub fn is_nifti(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return false,
    };
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

/// One descriptor per explicitly listed file.
///
/// Every path must name an existing file; the first that does not aborts the
/// whole list.
pub fn create_case_list<I, P>(files: I) -> SegResult<Vec<CaseDescriptor>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    files
        .into_iter()
        .map(|file| {
            let path = file.as_ref();
            if path.is_file() {
                Ok(CaseDescriptor::new(path))
            } else {
                Err(SegError::InputNotFound {
                    path: path.to_path_buf(),
                })
            }
        })
        .collect()
}

/// Collects NIfTI files below `dir`. Symlinked directories are not followed
/// and `skip` (an output tree nested in the input tree) is not entered.
fn collect_nifti_files(dir: &Path, skip: Option<&Path>, found: &mut Vec<PathBuf>) -> SegResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if skip == Some(path.as_path()) {
                debug!("not descending into output tree {}", path.display());
                continue;
            }
            collect_nifti_files(&path, skip, found)?;
        } else if is_nifti(&path) && path.is_file() {
            found.push(path);
        }
    }
    Ok(())
}

/// Walks `input_dir` recursively and returns a descriptor for every NIfTI
/// file whose output does not exist yet, sorted by input path.
///
/// The output root for `input_dir` is created when missing.
pub fn discover_cases(input_dir: &Path, naming: &OutputNaming) -> SegResult<Vec<CaseDescriptor>> {
    if !input_dir.is_dir() {
        return Err(SegError::InputNotFound {
            path: input_dir.to_path_buf(),
        });
    }

    let output_root = naming.output_root(input_dir);
    if !output_root.exists() {
        std::fs::create_dir_all(&output_root)?;
        info!("created output directory {}", output_root.display());
    }

    let nested_output = (output_root != input_dir && output_root.starts_with(input_dir))
        .then_some(output_root.as_path());
    let mut inputs = Vec::new();
    collect_nifti_files(input_dir, nested_output, &mut inputs)?;
    inputs.sort();
    let total = inputs.len();

    let cases: Vec<CaseDescriptor> = inputs
        .into_iter()
        .filter_map(|input| {
            let output = naming.output_path(&input);
            if output == input {
                debug!("skipping {}: maps onto itself", input.display());
                return None;
            }
            if output.exists() {
                debug!("skipping {}: {} exists", input.display(), output.display());
                return None;
            }
            Some(CaseDescriptor::new(input).with_output(output))
        })
        .collect();

    info!(
        "found {} NIfTI files under {}, {} still to segment",
        total,
        input_dir.display(),
        cases.len()
    );
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn recognizes_nifti_extensions() {
        assert!(is_nifti(Path::new("a/b.nii")));
        assert!(is_nifti(Path::new("a/b.nii.gz")));
        assert!(!is_nifti(Path::new("a/b.gz")));
        assert!(!is_nifti(Path::new("a/b.niix")));
    }

    #[test]
    fn case_list_requires_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.nii.gz");
        touch(&present);

        let cases = create_case_list([&present]).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, present);

        let missing = dir.path().join("missing.nii.gz");
        let err = create_case_list([&present, &missing]).unwrap_err();
        assert!(matches!(err, SegError::InputNotFound { path } if path == missing));
    }

    #[test]
    fn discovery_is_recursive_sorted_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("image");
        let b = root.join("sub02").join("case_reo").join("b.nii.gz");
        let a = root.join("sub01").join("case_reo").join("a.nii");
        touch(&b);
        touch(&a);
        touch(&root.join("notes.txt"));

        let naming = OutputNaming::Substitution;
        let cases = discover_cases(&root, &naming).unwrap();
        assert!(dir.path().join("mask").is_dir());
        let inputs: Vec<_> = cases.iter().map(|c| c.input.clone()).collect();
        assert_eq!(inputs, vec![a.clone(), b.clone()]);
        assert_eq!(
            cases[0].output.as_deref(),
            Some(dir.path().join("mask/sub01/case_seg/a.nii").as_path())
        );

        for case in &cases {
            touch(case.output.as_ref().unwrap());
        }
        assert!(discover_cases(&root, &naming).unwrap().is_empty());
    }

    #[test]
    fn postfix_naming_skips_cases_with_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = dir.path().join("in");
        touch(&inputs.join("scan1.nii.gz"));
        touch(&inputs.join("scan2.nii.gz"));
        let out_dir = dir.path().join("out");
        let naming = OutputNaming::Postfix {
            out_dir: out_dir.clone(),
            postfix: "seg".to_string(),
            ext: ".nii.gz".to_string(),
        };
        touch(&out_dir.join("scan1").join("scan1_seg.nii.gz"));

        let cases = discover_cases(&inputs, &naming).unwrap();
        assert_eq!(cases.len(), 1);
        assert!(cases[0].input.ends_with("scan2.nii.gz"));
    }

    #[test]
    fn nested_out_dir_is_not_rediscovered() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&data.join("scan1.nii.gz"));
        let naming = OutputNaming::Postfix {
            out_dir: data.join("masks"),
            postfix: "seg".to_string(),
            ext: ".nii.gz".to_string(),
        };

        let cases = discover_cases(&data, &naming).unwrap();
        assert_eq!(cases.len(), 1);
        touch(cases[0].output.as_ref().unwrap());
        assert!(discover_cases(&data, &naming).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("image");
        let scan = root.join("sub").join("a.nii");
        touch(&scan);
        std::os::unix::fs::symlink(&root, root.join("sub").join("loop")).unwrap();
        std::os::unix::fs::symlink(&scan, root.join("alias.nii")).unwrap();

        let cases = discover_cases(&root, &OutputNaming::Substitution).unwrap();
        let inputs: Vec<_> = cases.iter().map(|c| c.input.clone()).collect();
        assert_eq!(inputs, vec![root.join("alias.nii"), scan]);
    }

    #[test]
    fn missing_input_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_cases(&dir.path().join("nope"), &OutputNaming::Substitution);
        assert!(matches!(err, Err(SegError::InputNotFound { .. })));
    }
}
