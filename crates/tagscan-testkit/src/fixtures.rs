//! Sample rule catalogs in wire (JSON) form.

/// Two URL rules: one scoped to code, one unrestricted.
pub fn url_rules_json() -> &'static str {
    r#"[
        {
            "id": "TS0100",
            "name": "Contoso URL in code",
            "description": "Flags contoso.com outside comments",
            "tags": ["Network.Url.Contoso"],
            "severity": "moderate",
            "patterns": [
                {
                    "pattern": "contoso\\.com",
                    "type": "regex",
                    "confidence": "high",
                    "scopes": ["code"]
                }
            ]
        },
        {
            "id": "TS0101",
            "name": "Any URL",
            "description": "Flags http URLs anywhere",
            "tags": ["Network.Url"],
            "severity": "best-practice",
            "patterns": [
                {
                    "pattern": "https?://",
                    "type": "regex",
                    "confidence": "medium"
                }
            ]
        }
    ]"#
}

/// A rule that only fires when its condition pattern appears within three
/// lines of the match.
pub fn region_condition_rule_json() -> &'static str {
    r#"[
        {
            "id": "TS0200",
            "name": "Key near cipher call",
            "tags": ["Cryptography.KeyUse"],
            "severity": "important",
            "patterns": [
                { "pattern": "set_key", "type": "string", "confidence": "high" }
            ],
            "conditions": [
                {
                    "pattern": { "pattern": "cipher_init", "type": "string" },
                    "search_in": "finding-region(3,3)",
                    "negate_finding": false
                }
            ]
        }
    ]"#
}

/// A catalog that exercises language and filename targeting.
pub fn targeted_rules_json() -> &'static str {
    r#"[
        {
            "id": "TS0300",
            "name": "Rust unwrap",
            "tags": ["Practice.Unwrap"],
            "severity": "best-practice",
            "applies_to": ["rust"],
            "patterns": [
                { "pattern": "\\.unwrap\\(\\)", "type": "regex", "confidence": "high" }
            ]
        },
        {
            "id": "TS0301",
            "name": "Maven property",
            "tags": ["Metadata.Build.Java"],
            "severity": "moderate",
            "applies_to_file_regex": ["pom\\.xml"],
            "patterns": [
                { "pattern": "java\\.version", "type": "regex", "confidence": "high" }
            ]
        },
        {
            "id": "TS0302",
            "name": "TODO marker",
            "tags": ["Practice.Todo"],
            "severity": "manual-review",
            "patterns": [
                { "pattern": "TODO", "type": "string", "confidence": "medium" }
            ]
        }
    ]"#
}
