pub mod common {
    use std::ffi::OsStr;
    use std::io::{BufWriter, Stdout};
    use std::path::Path;

    /// Bytes one full-screen redraw needs in the worst case: every cell
    /// carries a foreground and a background truecolor escape.
    const BYTES_PER_CELL: usize = 40;

    pub fn get_larger_buffered_stdout(term_height: usize, term_width: usize) -> BufWriter<Stdout> {
        let capacity = (term_height * term_width * BYTES_PER_CELL).max(8 * 1024);
        BufWriter::with_capacity(capacity, std::io::stdout())
    }

    pub fn path_to_str(path: &Path) -> Option<&str> {
        path.file_name().and_then(|os_filename| os_filename.to_str())
    }

    pub fn has_extension(path: &Path, extension: &str) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn extension_check_ignores_case() {
            assert!(has_extension(Path::new("a/b/Cat.GIF"), "gif"));
            assert!(!has_extension(Path::new("cat.png"), "gif"));
            assert!(!has_extension(Path::new("gif"), "gif"));
        }

        #[test]
        fn path_to_str_takes_file_name() {
            assert_eq!(path_to_str(Path::new("/tmp/cat.gif")), Some("cat.gif"));
            assert_eq!(path_to_str(Path::new("/")), None);
        }
    }
}
