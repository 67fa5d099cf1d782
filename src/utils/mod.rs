use std::io;
use std::path::Path;

/// Lowercase ASCII slug: accented Latin letters lose their accents, and runs
/// of anything else outside `[a-z0-9]` collapse into a single `-`
pub fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(fold_latin)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn fold_latin(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => 'u',
        'ý' | 'ÿ' => 'y',
        'š' | 'ś' => 's',
        'ž' | 'ź' | 'ż' => 'z',
        'ř' => 'r',
        'ď' => 'd',
        'ť' => 't',
        'ł' => 'l',
        other => other,
    }
}

/// Normalize MAC address to lowercase with colons
pub fn normalize_mac(mac: &str) -> String {
    // Remove any existing separators
    let clean: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    if clean.len() != 12 {
        return mac.to_lowercase();
    }

    clean
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
        .to_lowercase()
}

/// Six hex byte pairs separated by `:` or `-` (case-insensitive)
pub fn is_mac_address(s: &str) -> bool {
    regex_lite::Regex::new(r"^([0-9a-f]{2}[:-]){5}([0-9a-f]{2})$")
        .map(|re| re.is_match(&s.to_lowercase()))
        .unwrap_or(false)
}

/// Recursively copy a directory tree
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove empty directories below `root`, keeping `root` itself.
/// Returns true when `root` ended up empty.
pub fn remove_empty_dirs(root: &Path) -> io::Result<bool> {
    let mut empty = true;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() && remove_empty_dirs(&path)? {
            std::fs::remove_dir(&path)?;
        } else {
            empty = false;
        }
    }
    Ok(empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("HQ"), "hq");
        assert_eq!(slugify("Model-X"), "model-x");
        assert_eq!(slugify("  Acme  Corp. (East) "), "acme-corp-east");
        assert_eq!(slugify("Unspecified"), "unspecified");
    }

    #[test]
    fn test_slugify_stays_ascii() {
        assert_eq!(slugify("Café"), "cafe");
        assert_eq!(slugify("Zürich Büro"), "zurich-buro");
        assert_eq!(slugify("東京 Lab"), "lab");
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("AA:BB:CC:DD:EE:FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("AABBCCDDEEFF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_is_mac_address() {
        assert!(is_mac_address("aa:bb:cc:dd:ee:ff"));
        assert!(is_mac_address("AA-BB-CC-DD-EE-FF"));
        assert!(is_mac_address("00:1c:73-aa:bb:cc"));
        assert!(!is_mac_address("aabbccddeeff"));
        assert!(!is_mac_address("aa:bb:cc:dd:ee"));
        assert!(!is_mac_address("aa:bb:cc:dd:ee:ff:00"));
        assert!(!is_mac_address("10.0.0.1"));
    }

    #[test]
    fn test_copy_dir_all() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("sites.yml"), "- name: HQ\n").unwrap();
        std::fs::write(src.path().join("nested/tags.yml"), "[]\n").unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_dir_all(src.path(), dst.path()).unwrap();

        assert_eq!(std::fs::read_to_string(dst.path().join("sites.yml")).unwrap(), "- name: HQ\n");
        assert!(dst.path().join("nested/tags.yml").is_file());
    }

    #[test]
    fn test_remove_empty_dirs_keeps_root_and_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a/b/c")).unwrap();
        std::fs::create_dir_all(root.path().join("images")).unwrap();
        std::fs::write(root.path().join("images/logo.png"), [0u8; 4]).unwrap();

        let empty = remove_empty_dirs(root.path()).unwrap();

        assert!(!empty);
        assert!(root.path().is_dir());
        assert!(!root.path().join("a").exists());
        assert!(root.path().join("images/logo.png").is_file());
    }
}
