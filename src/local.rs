use std::path::{Path, PathBuf};

use dicom_dictionary_std::tags;
use dicom_object::OpenFileOptions;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    error::{Result, XnatError},
    structs::UidList,
};

/// Collects the distinct StudyInstanceUIDs of the DICOM files in `dir`, in
/// the order they are found. Subdirectories are only visited when
/// `recursive` is set. Files that are not DICOM are skipped.
pub fn uids_from_paths(dir: impl AsRef<Path>, recursive: bool) -> Result<UidList> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(XnatError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut uids = UidList::default();
    for path in files_in(dir, recursive) {
        match study_uid(&path) {
            Ok(uid) => {
                debug!("{} belongs to study {}", path.display(), uid);
                uids.extend([uid]);
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    info!(
        "Found {} study UID(s) in {}",
        uids.len(),
        dir.display()
    );
    Ok(uids)
}

fn files_in(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = match recursive {
        true => WalkDir::new(dir).into_iter(),
        false => WalkDir::new(dir).max_depth(1).into_iter(),
    };

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| {
            let entry = entry.ok()?;
            entry.file_type().is_file().then(|| entry.into_path())
        })
        .collect();
    files.sort();
    files
}

fn study_uid(path: &Path) -> Result<String> {
    let dicom_error = |message: String| XnatError::Dicom {
        path: path.to_path_buf(),
        message,
    };

    // header only, pixel data is never needed here
    let object = OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map_err(|e| dicom_error(e.to_string()))?;

    let uid = object
        .element_by_name("StudyInstanceUID")
        .map_err(|e| dicom_error(e.to_string()))?
        .to_str()
        .map_err(|e| dicom_error(e.to_string()))?
        .trim_end_matches(['\0', ' '])
        .to_string();

    if uid.is_empty() {
        return Err(dicom_error("empty StudyInstanceUID".to_string()));
    }
    Ok(uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};
    use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
    use std::fs;

    const MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4";
    const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

    fn write_instance(path: &Path, study_uid: &str, sop_uid: &str) {
        let mut object = InMemDicomObject::new_empty();
        object.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(MR_IMAGE_STORAGE),
        ));
        object.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(sop_uid),
        ));
        object.put(DataElement::new(
            tags::STUDY_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(study_uid),
        ));

        let file = object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(EXPLICIT_VR_LE)
                    .media_storage_sop_class_uid(MR_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(sop_uid),
            )
            .unwrap();
        file.write_to_file(path).unwrap();
    }

    #[test]
    fn test_study_uids_are_distinct_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        write_instance(&dir.path().join("a.dcm"), "1.2.826.0.1.7", "1.2.826.0.1.7.1");
        write_instance(&dir.path().join("b.dcm"), "1.2.826.0.1.3 ", "1.2.826.0.1.3.1");
        write_instance(&dir.path().join("c.dcm"), "1.2.826.0.1.7", "1.2.826.0.1.7.2");
        fs::write(dir.path().join("notes.txt"), "not a DICOM file").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_instance(
            &dir.path().join("nested").join("d.dcm"),
            "1.2.826.0.1.9\0",
            "1.2.826.0.1.9.1",
        );

        let uids = uids_from_paths(dir.path(), false).unwrap();
        assert_eq!(uids.as_slice(), ["1.2.826.0.1.7", "1.2.826.0.1.3"]);

        let uids = uids_from_paths(dir.path(), true).unwrap();
        assert_eq!(
            uids.as_slice(),
            ["1.2.826.0.1.7", "1.2.826.0.1.3", "1.2.826.0.1.9"]
        );
    }

    #[test]
    fn test_non_dicom_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a DICOM file").unwrap();
        fs::write(dir.path().join("empty.dcm"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("more.txt"), "still not DICOM").unwrap();

        let uids = uids_from_paths(dir.path(), true).unwrap();
        assert!(uids.is_empty());
    }

    #[test]
    fn test_files_in_respects_recursion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dcm"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("b.dcm"), b"").unwrap();

        assert_eq!(files_in(dir.path(), false).len(), 1);
        assert_eq!(files_in(dir.path(), true).len(), 2);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = uids_from_paths(dir.path().join("missing"), false).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
