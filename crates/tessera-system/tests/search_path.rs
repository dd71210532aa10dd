//! Resource lookup against a realistic skin layout

use std::fs;

use tessera_system::{atomic_write, SearchPath};

#[test]
fn test_package_path_resolves_skin_images() {
    let root = tempfile::tempdir().unwrap();
    let share = root.path().join("share");
    let applets = root.path().join("applets");
    fs::create_dir_all(share.join("images")).unwrap();
    fs::create_dir_all(applets.join("images")).unwrap();

    atomic_write(share.join("images/button.png"), b"share").unwrap();
    atomic_write(applets.join("images/button.png"), b"applets").unwrap();
    atomic_write(applets.join("images/icon.png"), b"icon").unwrap();

    let package_path = format!(
        "{}/?.lua;{}/?/init.lua;;",
        share.display(),
        applets.display()
    );
    let sp = SearchPath::from_package_path(&package_path);
    assert_eq!(sp.prefixes().len(), 2);

    // First prefix wins
    let button = sp.find("images/button.png").unwrap();
    assert_eq!(fs::read(button).unwrap(), b"share");

    let icon = sp.find("images/icon.png").unwrap();
    assert_eq!(fs::read(icon).unwrap(), b"icon");

    assert!(sp.find("images/absent.png").is_none());
}
