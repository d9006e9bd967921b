//! Search text, search options and status checkboxes, compiled into the
//! predicate every tab filters its rows with.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use regex::{Regex, RegexBuilder};

use crate::process::mode_of;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub use_regex: bool,
    pub match_case: bool,
    pub whole_word: bool,
    pub fuzzy: bool,
}

/// Confinement-status checkboxes. Rows whose status has no recognised mode
/// are never hidden by these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusToggles {
    pub enforce: bool,
    pub complain: bool,
    pub unconfined: bool,
}

impl Default for StatusToggles {
    fn default() -> Self {
        Self {
            enforce: true,
            complain: true,
            unconfined: true,
        }
    }
}

impl StatusToggles {
    pub fn allows(&self, status: &str) -> bool {
        match mode_of(status) {
            Some("enforce") => self.enforce,
            Some("complain") => self.complain,
            Some("unconfined") => self.unconfined,
            Some(_) => true,
            None if status.trim() == "unconfined" => self.unconfined,
            None => true,
        }
    }
}

/// Everything a tab's filter predicate depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub text: String,
    pub options: SearchOptions,
    pub toggles: StatusToggles,
}

enum Needle {
    Any,
    Pattern(Regex),
    Fuzzy(SkimMatcherV2, String),
}

/// A [`FilterState`] compiled once per filter pass.
pub struct SearchFilter {
    needle: Needle,
    toggles: StatusToggles,
}

impl SearchFilter {
    pub fn new(state: &FilterState) -> Self {
        Self {
            needle: compile(&state.text, state.options),
            toggles: state.toggles,
        }
    }

    /// True when any of `fields` matches the search text and `status`, if
    /// given, passes the checkboxes.
    pub fn matches(&self, fields: &[&str], status: Option<&str>) -> bool {
        if let Some(status) = status {
            if !self.toggles.allows(status) {
                return false;
            }
        }
        match &self.needle {
            Needle::Any => true,
            Needle::Pattern(re) => fields.iter().any(|field| re.is_match(field)),
            Needle::Fuzzy(matcher, text) => fields
                .iter()
                .any(|field| matcher.fuzzy_match(field, text).is_some()),
        }
    }
}

fn compile(text: &str, options: SearchOptions) -> Needle {
    let text = text.trim();
    if text.is_empty() {
        return Needle::Any;
    }

    if options.fuzzy && !options.use_regex && !options.whole_word {
        let matcher = SkimMatcherV2::default();
        let matcher = if options.match_case {
            matcher.respect_case()
        } else {
            matcher.ignore_case()
        };
        return Needle::Fuzzy(matcher, text.to_string());
    }

    let literal = regex::escape(text);
    let source = if options.use_regex { text } else { literal.as_str() };
    match build_pattern(source, options) {
        Ok(re) => Needle::Pattern(re),
        Err(err) => {
            log::debug!("search text {text:?} is not a valid regex ({err}), matching literally");
            match build_pattern(&literal, options) {
                Ok(re) => Needle::Pattern(re),
                Err(_) => Needle::Any,
            }
        }
    }
}

fn build_pattern(source: &str, options: SearchOptions) -> Result<Regex, regex::Error> {
    let pattern = if options.whole_word {
        format!(r"\b(?:{source})\b")
    } else {
        source.to_string()
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!options.match_case)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(text: &str, options: SearchOptions) -> SearchFilter {
        SearchFilter::new(&FilterState {
            text: text.to_string(),
            options,
            toggles: StatusToggles::default(),
        })
    }

    #[test]
    fn test_empty_text_matches_everything() {
        let f = filter("   ", SearchOptions::default());
        assert!(f.matches(&["anything"], None));
        assert!(f.matches(&[], None));
    }

    #[test]
    fn test_plain_search_is_case_insensitive_substring() {
        let f = filter("SSH", SearchOptions::default());
        assert!(f.matches(&["bash", "sshd"], None));
        assert!(!f.matches(&["bash"], None));
    }

    #[test]
    fn test_plain_search_escapes_regex_syntax() {
        let f = filter("a.b", SearchOptions::default());
        assert!(f.matches(&["xa.by"], None));
        assert!(!f.matches(&["axb"], None));
    }

    #[test]
    fn test_match_case() {
        let options = SearchOptions {
            match_case: true,
            ..SearchOptions::default()
        };
        let f = filter("Xorg", options);
        assert!(f.matches(&["Xorg"], None));
        assert!(!f.matches(&["xorg"], None));
    }

    #[test]
    fn test_regex_and_whole_word() {
        let options = SearchOptions {
            use_regex: true,
            ..SearchOptions::default()
        };
        assert!(filter("^ba.h$", options).matches(&["bash"], None));
        assert!(!filter("^ba.h$", options).matches(&["bashrc"], None));

        let whole = SearchOptions {
            whole_word: true,
            ..SearchOptions::default()
        };
        assert!(filter("docker", whole).matches(&["docker-default (enforce)"], None));
        assert!(!filter("docker", whole).matches(&["dockerd"], None));
    }

    #[test]
    fn test_invalid_regex_falls_back_to_literal() {
        let options = SearchOptions {
            use_regex: true,
            ..SearchOptions::default()
        };
        let f = filter("foo(", options);
        assert!(f.matches(&["call foo(bar)"], None));
        assert!(!f.matches(&["foo"], None));
    }

    #[test]
    fn test_fuzzy_search() {
        let options = SearchOptions {
            fuzzy: true,
            ..SearchOptions::default()
        };
        let f = filter("ntwkmgr", options);
        assert!(f.matches(&["NetworkManager"], None));
        assert!(!f.matches(&["sshd"], None));
    }

    #[test]
    fn test_status_toggles() {
        let toggles = StatusToggles {
            enforce: false,
            complain: true,
            unconfined: false,
        };
        assert!(!toggles.allows("docker-default (enforce)"));
        assert!(toggles.allows("firefox (complain)"));
        assert!(!toggles.allows("unconfined"));
        assert!(toggles.allows("libvirt (kill)"));

        let f = SearchFilter::new(&FilterState {
            text: String::new(),
            options: SearchOptions::default(),
            toggles,
        });
        assert!(!f.matches(&["dockerd"], Some("docker-default (enforce)")));
        assert!(f.matches(&["dockerd"], None));
    }
}
