//! DOS name handling: wildcard matching, volume labels, trailing dots and
//! 8.3 short-name synthesis.

use std::borrow::Cow;

use crate::DOS_PATHLENGTH;

/// Character inserted when a short name would otherwise have an empty base.
pub const INVALID_NAME_CHAR: char = '_';

/// Whether `c` may appear in a DOS 8.3 name as-is.
///
/// Valid: A-Z, 0-9 and ``! # $ % & ' ( ) - @ ^ _ ` { } ~``.
pub fn is_valid_dos_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || "!#$%&'()-@^_`{}~".contains(c)
}

/// Uppercase `c` and replace it with [`INVALID_NAME_CHAR`] if it is still
/// not a valid DOS name character.
pub fn to_upper_and_filter(c: char) -> char {
    let upper = c.to_ascii_uppercase();
    if is_valid_dos_char(upper) {
        upper
    } else {
        INVALID_NAME_CHAR
    }
}

pub(crate) fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// Split a name into space padded, uppercased 8 + 3 byte fields.
fn split_8_3(name: &str) -> ([u8; 8], [u8; 3]) {
    let mut base = [b' '; 8];
    let mut ext = [b' '; 3];
    let bytes = name.as_bytes();
    let (base_part, ext_part) = match name.rfind('.') {
        Some(pos) => (&bytes[..pos], &bytes[pos + 1..]),
        None => (bytes, &[][..]),
    };
    for (dst, src) in base.iter_mut().zip(base_part) {
        *dst = src.to_ascii_uppercase();
    }
    for (dst, src) in ext.iter_mut().zip(ext_part) {
        *dst = src.to_ascii_uppercase();
    }
    (base, ext)
}

/// Compare a file name against a DOS wildcard pattern.
///
/// Both are split into an 8 character base and 3 character extension.
/// `?` matches any character, `*` in the base skips to the extension and
/// `*` in the extension matches the rest.
///
/// # Examples
/// ```
/// use dosfs_core::wild_file_cmp;
/// assert!(wild_file_cmp("README.TXT", "*.*"));
/// assert!(wild_file_cmp("FOO.TXT", "FOO.???"));
/// assert!(!wild_file_cmp("FOO.TXT", "BAR.*"));
/// ```
pub fn wild_file_cmp(file: &str, wild: &str) -> bool {
    // The most common pattern by far
    if wild.starts_with('*') && wild.contains(".*") {
        return true;
    }

    let (file_name, file_ext) = split_8_3(file);
    let (wild_name, wild_ext) = split_8_3(wild);

    for (w, f) in wild_name.iter().zip(file_name.iter()) {
        if *w == b'*' {
            break;
        }
        if *w != b'?' && w != f {
            return false;
        }
    }
    for (w, f) in wild_ext.iter().zip(file_ext.iter()) {
        if *w == b'*' {
            return true;
        }
        if *w != b'?' && w != f {
            return false;
        }
    }
    true
}

/// Turn a long volume name into a dotted 8.3 volume label.
///
/// Optical media keep their case (some titles look for a mixed-case label).
/// A trailing dot is removed, except for optical labels with exactly 8
/// base characters: CD detection code in a few games expects `"ABCDEFGH."`.
///
/// # Examples
/// ```
/// use dosfs_core::format_label;
/// assert_eq!(format_label("game disc", false), "GAME DIS.C");
/// assert_eq!(format_label("Disc.One", true), "Disc.One");
/// ```
pub fn format_label(input: &str, optical: bool) -> String {
    let src: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut togo = 8;
    let mut pos = 0;
    let mut point = false;

    while togo > 0 {
        let Some(&c) = src.get(pos) else { break };
        if !point && c == '.' {
            togo = 4;
            point = true;
        }
        out.push(if optical { c } else { c.to_ascii_uppercase() });
        pos += 1;
        togo -= 1;
        if togo == 0 && !point {
            if src.get(pos) == Some(&'.') {
                pos += 1;
            }
            out.push('.');
            point = true;
            togo = 3;
        }
    }

    if out.ends_with('.') && !(optical && out.chars().count() == 9) {
        out.pop();
    }
    out
}

/// Remove dots that end a path component, keeping `.`, `..` and dot runs.
///
/// `"AAA.\BBB.\.\..\CCC."` becomes `"AAA\BBB\.\..\CCC"`. If the rewritten
/// path would not fit into a DOS path the input is returned unchanged.
pub fn remove_ending_dots(path: &str) -> Cow<'_, str> {
    let bytes = path.as_bytes();
    if bytes.len() < 2 {
        return Cow::Borrowed(path);
    }

    let mut out = String::with_capacity(path.len());
    let mut changed = false;
    for (i, c) in path.char_indices() {
        if c == '.' && i > 0 {
            let prev = bytes[i - 1] as char;
            let ends_component = bytes.get(i + 1).map_or(true, |&n| is_separator(n as char));
            if ends_component && !is_separator(prev) && prev != '.' {
                changed = true;
                continue;
            }
        }
        out.push(c);
    }

    if !changed || out.len() >= DOS_PATHLENGTH {
        return Cow::Borrowed(path);
    }
    Cow::Owned(out)
}

/// Whether `name` already is a valid 8.3 name.
pub fn is_valid_8dot3(name: &str) -> bool {
    matches!(make_8dot3_name(name), Cow::Borrowed(_))
}

/// Create the 8.3 short name for one path component.
///
/// Returns `Cow::Borrowed` with the input when it already satisfies the 8.3
/// rules, or `Cow::Owned` with a synthesized name built from the first and
/// last four characters of the base plus up to three extension characters.
/// There is no `~N` numbering; callers verify the guess against the long
/// name known to the drive.
///
/// # Examples
/// ```
/// use std::borrow::Cow;
/// use dosfs_core::make_8dot3_name;
/// assert!(matches!(make_8dot3_name("FILE.TXT"), Cow::Borrowed("FILE.TXT")));
/// assert_eq!(make_8dot3_name("longfilename.longext"), "LONGNAME.LON");
/// ```
pub fn make_8dot3_name(source: &str) -> Cow<'_, str> {
    let chars: Vec<char> = source.chars().collect();
    let dot = chars.iter().rposition(|&c| c == '.');
    let (base, ext) = match dot {
        Some(pos) => (&chars[..pos], &chars[pos + 1..]),
        None => (&chars[..], &[][..]),
    };

    if base.len() <= 8
        && ext.len() <= 3
        && base.iter().chain(ext).all(|&c| is_valid_dos_char(c))
    {
        return Cow::Borrowed(source);
    }

    let (left, right) = if base.len() > 8 { (4, 4) } else { (base.len(), 0) };
    let mut out: String = base[..left]
        .iter()
        .chain(&base[base.len() - right..])
        .map(|&c| to_upper_and_filter(c))
        .collect();
    if base.is_empty() {
        out.push(INVALID_NAME_CHAR);
    }
    if !ext.is_empty() {
        out.push('.');
        out.extend(ext.iter().take(3).map(|&c| to_upper_and_filter(c)));
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wild_file_cmp_star_dot_star() {
        assert!(wild_file_cmp("README.TXT", "*.*"));
        assert!(wild_file_cmp("NOEXT", "*.*"));
        // Any leading star with a starred extension matches everything
        assert!(wild_file_cmp("GAME.EXE", "*X.*"));
        assert!(!wild_file_cmp("GAME.EXE", "*.COM"));
    }

    #[test]
    fn test_wild_file_cmp_question_marks() {
        assert!(wild_file_cmp("FOO.TXT", "FOO.???"));
        assert!(wild_file_cmp("foo.txt", "F?O.T?T"));
        assert!(!wild_file_cmp("FOO.TXT", "F?X.TXT"));
    }

    #[test]
    fn test_wild_file_cmp_mismatch() {
        assert!(!wild_file_cmp("FOO.TXT", "BAR.*"));
        assert!(!wild_file_cmp("FOO.TXT", "FOO.COM"));
    }

    #[test]
    fn test_wild_file_cmp_star_in_base() {
        assert!(wild_file_cmp("GAME.EXE", "G*.EXE"));
        assert!(!wild_file_cmp("GAME.EXE", "G*.COM"));
        assert!(wild_file_cmp("GAME.EXE", "GAME.*"));
    }

    #[test]
    fn test_wild_file_cmp_truncates() {
        // Only 8 + 3 characters take part in the comparison
        assert!(wild_file_cmp("LONGFILENAME.TEXT", "LONGFILE.TEX"));
    }

    #[test]
    fn test_format_label_uppercases() {
        assert_eq!(format_label("GAME DISC", false), "GAME DIS.C");
        assert_eq!(format_label("hello", false), "HELLO");
        assert_eq!(format_label("data.dat", false), "DATA.DAT");
    }

    #[test]
    fn test_format_label_strips_trailing_dot() {
        assert_eq!(format_label("ABCDEFGH", false), "ABCDEFGH");
        assert_eq!(format_label("AB.", false), "AB");
    }

    #[test]
    fn test_format_label_optical_quirk() {
        // 8 base characters on optical media keep the dot
        assert_eq!(format_label("ABCDEFGH", true), "ABCDEFGH.");
        assert_eq!(format_label("Fifa", true), "Fifa");
        assert_eq!(format_label("AB.", true), "AB");
    }

    #[test]
    fn test_remove_ending_dots() {
        assert_eq!(
            remove_ending_dots("AAA.\\BBB.\\.\\..\\CCC."),
            "AAA\\BBB\\.\\..\\CCC"
        );
    }

    #[test]
    fn test_remove_ending_dots_keeps_navigation() {
        assert!(matches!(remove_ending_dots(".\\..\\A"), Cow::Borrowed(_)));
        assert!(matches!(remove_ending_dots(".."), Cow::Borrowed(_)));
        assert!(matches!(remove_ending_dots("A..\\B"), Cow::Borrowed(_)));
        assert!(matches!(remove_ending_dots("."), Cow::Borrowed(_)));
    }

    #[test]
    fn test_remove_ending_dots_short_path() {
        assert_eq!(remove_ending_dots("A."), "A");
        assert_eq!(remove_ending_dots("DIR./FILE"), "DIR/FILE");
    }

    #[test]
    fn test_remove_ending_dots_too_long_is_noop() {
        let long = format!("{}.", "A".repeat(DOS_PATHLENGTH + 5));
        assert!(matches!(remove_ending_dots(&long), Cow::Borrowed(_)));
    }

    #[test]
    fn test_make_8dot3_unchanged() {
        assert!(matches!(make_8dot3_name("FILE.TXT"), Cow::Borrowed("FILE.TXT")));
        assert!(matches!(make_8dot3_name("NOEXT"), Cow::Borrowed(_)));
        assert!(matches!(make_8dot3_name("A$B~1.C"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_make_8dot3_long_name() {
        let short = make_8dot3_name("longfilename.longext");
        assert!(matches!(short, Cow::Owned(_)));
        assert_eq!(short, "LONGNAME.LON");
    }

    #[test]
    fn test_make_8dot3_lowercase_changes() {
        assert_eq!(make_8dot3_name("readme.txt"), "README.TXT");
        assert!(!is_valid_8dot3("readme.txt"));
    }

    #[test]
    fn test_make_8dot3_filters_invalid() {
        assert_eq!(make_8dot3_name("my file+.t t"), "MY_FILE_.T_T");
        assert_eq!(make_8dot3_name("a b"), "A_B");
    }

    #[test]
    fn test_make_8dot3_empty_base() {
        assert_eq!(make_8dot3_name(".profile"), "_.PRO");
    }

    #[test]
    fn test_make_8dot3_multiple_dots() {
        // Only the last dot separates the extension
        assert_eq!(make_8dot3_name("a.b.c"), "A_B.C");
    }
}
