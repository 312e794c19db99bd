use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

// Lowercase extension -> markdown fence tag.
static EXTENSION_TAGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("rs", "rust"),
        ("py", "python"),
        ("pyi", "python"),
        ("rb", "ruby"),
        ("rake", "ruby"),
        ("go", "go"),
        ("c", "c"),
        ("h", "c"),
        ("cc", "cpp"),
        ("cpp", "cpp"),
        ("cxx", "cpp"),
        ("hpp", "cpp"),
        ("cs", "csharp"),
        ("java", "java"),
        ("kt", "kotlin"),
        ("kts", "kotlin"),
        ("scala", "scala"),
        ("swift", "swift"),
        ("js", "javascript"),
        ("cjs", "javascript"),
        ("mjs", "javascript"),
        ("jsx", "jsx"),
        ("ts", "typescript"),
        ("tsx", "tsx"),
        ("php", "php"),
        ("lua", "lua"),
        ("pl", "perl"),
        ("r", "r"),
        ("dart", "dart"),
        ("ex", "elixir"),
        ("exs", "elixir"),
        ("erl", "erlang"),
        ("hs", "haskell"),
        ("ml", "ocaml"),
        ("clj", "clojure"),
        ("zig", "zig"),
        ("sh", "bash"),
        ("bash", "bash"),
        ("zsh", "zsh"),
        ("fish", "fish"),
        ("ps1", "powershell"),
        ("sql", "sql"),
        ("html", "html"),
        ("htm", "html"),
        ("css", "css"),
        ("scss", "scss"),
        ("vue", "vue"),
        ("svelte", "svelte"),
        ("md", "markdown"),
        ("markdown", "markdown"),
        ("org", "org"),
        ("rst", "rst"),
        ("tex", "latex"),
        ("json", "json"),
        ("yaml", "yaml"),
        ("yml", "yaml"),
        ("toml", "toml"),
        ("xml", "xml"),
        ("ini", "ini"),
        ("cfg", "ini"),
        ("proto", "protobuf"),
        ("graphql", "graphql"),
        ("tf", "hcl"),
        ("nix", "nix"),
        ("cmake", "cmake"),
        ("diff", "diff"),
        ("patch", "diff"),
    ]
    .into_iter()
    .collect()
});

/// Returns the fence tag for a file with a known extension or well-known
/// file name. Unknown files get `None` and render an untagged fence.
pub fn language_tag(path: &Path) -> Option<&'static str> {
    if let Some(tag) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(filename_tag)
    {
        return Some(tag);
    }
    let extension = path.extension()?.to_str()?.to_lowercase();
    EXTENSION_TAGS.get(extension.as_str()).copied()
}

// Exact file names, case-sensitive.
fn filename_tag(filename: &str) -> Option<&'static str> {
    match filename {
        "Dockerfile" | "Containerfile" => Some("dockerfile"),
        "Makefile" | "GNUmakefile" => Some("makefile"),
        "CMakeLists.txt" => Some("cmake"),
        "Rakefile" | "Gemfile" => Some("ruby"),
        "Cargo.lock" => Some("toml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_extensions() {
        assert_eq!(language_tag(Path::new("src/main.rs")), Some("rust"));
        assert_eq!(language_tag(Path::new("a.py")), Some("python"));
        assert_eq!(language_tag(Path::new("web/App.TSX")), Some("tsx"));
        assert_eq!(language_tag(Path::new("ci.yml")), Some("yaml"));
    }

    #[test]
    fn well_known_file_names_win_over_extension() {
        assert_eq!(language_tag(Path::new("Dockerfile")), Some("dockerfile"));
        assert_eq!(language_tag(Path::new("CMakeLists.txt")), Some("cmake"));
        assert_eq!(language_tag(Path::new("docs/Makefile")), Some("makefile"));
    }

    #[test]
    fn unknown_files_have_no_tag() {
        assert_eq!(language_tag(Path::new("b.bin")), None);
        assert_eq!(language_tag(Path::new("LICENSE")), None);
        assert_eq!(language_tag(Path::new(".gitignore")), None);
    }
}
