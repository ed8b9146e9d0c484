//! Static language registry: filename/extension to language name, comment
//! delimiters, and file kind.
//!
//! Exact filename matches win over extension matches; extension lookup is
//! case-insensitive. The registry is an opaque oracle to the rest of the
//! engine: callers hand `TextContainer` a language *name* and it asks back
//! for the comment delimiters.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tagscan_types::{FileKind, LanguageInfo};

/// Comment delimiters for one language. Any of the three may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommentStyle {
    /// Line comment opener, runs to end of line (`//`, `#`, `--`).
    pub inline: Option<&'static str>,
    /// Block comment opener (`/*`, `<!--`).
    pub prefix: Option<&'static str>,
    /// Block comment closer (`*/`, `-->`).
    pub suffix: Option<&'static str>,
}

impl CommentStyle {
    pub fn has_comments(&self) -> bool {
        self.inline.is_some() || self.prefix.is_some()
    }
}

struct LangDef {
    name: &'static str,
    kind: FileKind,
    extensions: &'static [&'static str],
    filenames: &'static [&'static str],
    inline: Option<&'static str>,
    prefix: Option<&'static str>,
    suffix: Option<&'static str>,
}

const C_FAMILY: (Option<&str>, Option<&str>, Option<&str>) =
    (Some("//"), Some("/*"), Some("*/"));
const HASH_ONLY: (Option<&str>, Option<&str>, Option<&str>) = (Some("#"), None, None);
const XML_STYLE: (Option<&str>, Option<&str>, Option<&str>) =
    (None, Some("<!--"), Some("-->"));

macro_rules! lang {
    ($name:literal, $kind:expr, $exts:expr, $files:expr, $style:expr) => {
        LangDef {
            name: $name,
            kind: $kind,
            extensions: $exts,
            filenames: $files,
            inline: $style.0,
            prefix: $style.1,
            suffix: $style.2,
        }
    };
}

static LANGUAGES: &[LangDef] = &[
    lang!("rust", FileKind::Code, &["rs"], &[], C_FAMILY),
    lang!("c", FileKind::Code, &["c", "h"], &[], C_FAMILY),
    lang!("cpp", FileKind::Code, &["cpp", "cc", "cxx", "hpp", "hxx", "hh"], &[], C_FAMILY),
    lang!("csharp", FileKind::Code, &["cs"], &[], C_FAMILY),
    lang!("java", FileKind::Code, &["java"], &[], C_FAMILY),
    lang!("kotlin", FileKind::Code, &["kt", "kts"], &[], C_FAMILY),
    lang!("go", FileKind::Code, &["go"], &[], C_FAMILY),
    lang!("swift", FileKind::Code, &["swift"], &[], C_FAMILY),
    lang!("scala", FileKind::Code, &["scala"], &[], C_FAMILY),
    lang!("javascript", FileKind::Code, &["js", "jsx", "mjs", "cjs"], &[], C_FAMILY),
    lang!("typescript", FileKind::Code, &["ts", "tsx", "mts", "cts"], &[], C_FAMILY),
    lang!("php", FileKind::Code, &["php"], &[], C_FAMILY),
    lang!("python", FileKind::Code, &["py", "pyw"], &[], HASH_ONLY),
    lang!("ruby", FileKind::Code, &["rb", "rake"], &["Rakefile", "Gemfile"], HASH_ONLY),
    lang!("shell", FileKind::Code, &["sh", "bash", "zsh", "ksh"], &[], HASH_ONLY),
    lang!("perl", FileKind::Code, &["pl", "pm"], &[], HASH_ONLY),
    lang!("sql", FileKind::Code, &["sql"], &[], (Some("--"), Some("/*"), Some("*/"))),
    lang!("html", FileKind::Code, &["html", "htm", "xhtml"], &[], XML_STYLE),
    lang!("xml", FileKind::Code, &["xml", "xsl", "xslt", "svg", "csproj"], &[], XML_STYLE),
    lang!("markdown", FileKind::Code, &["md", "markdown"], &[], XML_STYLE),
    lang!("json", FileKind::Manifest, &["json"], &[], (None::<&str>, None::<&str>, None::<&str>)),
    lang!("yaml", FileKind::Manifest, &["yml", "yaml"], &[], HASH_ONLY),
    lang!("toml", FileKind::Manifest, &["toml"], &[], HASH_ONLY),
    // Build-system files, mostly matched by exact name.
    lang!("pom.xml", FileKind::Build, &[], &["pom.xml"], XML_STYLE),
    lang!("gradle", FileKind::Build, &["gradle"], &["build.gradle", "settings.gradle"], C_FAMILY),
    lang!("makefile", FileKind::Build, &["mk"], &["Makefile", "makefile", "GNUmakefile"], HASH_ONLY),
    lang!("cmake", FileKind::Build, &["cmake"], &["CMakeLists.txt"], HASH_ONLY),
    lang!("dockerfile", FileKind::Build, &[], &["Dockerfile", "Containerfile"], HASH_ONLY),
    lang!("package.json", FileKind::Build, &[], &["package.json"], (None::<&str>, None::<&str>, None::<&str>)),
    lang!("cargo.toml", FileKind::Build, &[], &["Cargo.toml"], HASH_ONLY),
    lang!("go.mod", FileKind::Build, &[], &["go.mod"], C_FAMILY),
    lang!("requirements.txt", FileKind::Build, &[], &["requirements.txt"], HASH_ONLY),
];

static BY_EXTENSION: Lazy<HashMap<&'static str, &'static LangDef>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for def in LANGUAGES {
        for ext in def.extensions {
            map.insert(*ext, def);
        }
    }
    map
});

static BY_FILENAME: Lazy<HashMap<&'static str, &'static LangDef>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for def in LANGUAGES {
        for file in def.filenames {
            map.insert(*file, def);
        }
    }
    map
});

static BY_NAME: Lazy<HashMap<&'static str, &'static LangDef>> =
    Lazy::new(|| LANGUAGES.iter().map(|def| (def.name, def)).collect());

/// Resolve a file path to its language, or `None` when the registry does not
/// know the file. Callers that scan unknown file types construct a
/// [`LanguageInfo`] with [`FileKind::Unknown`] themselves.
pub fn from_file_name(path: &str) -> Option<LanguageInfo> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);

    if let Some(def) = BY_FILENAME.get(file_name) {
        return Some(LanguageInfo::new(def.name, def.kind));
    }

    let ext = file_name.rsplit_once('.').map(|(_, e)| e)?;
    let def = BY_EXTENSION.get(ext.to_ascii_lowercase().as_str())?;
    Some(LanguageInfo::new(def.name, def.kind))
}

/// Comment delimiters for a language name. Unregistered names get an empty
/// style, which makes every scope check accept (the file has no comments to
/// distinguish).
pub fn comment_style(language: &str) -> CommentStyle {
    match BY_NAME.get(language) {
        Some(def) => CommentStyle {
            inline: def.inline,
            prefix: def.prefix,
            suffix: def.suffix,
        },
        None => CommentStyle::default(),
    }
}
