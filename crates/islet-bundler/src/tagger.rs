//! Marker/query tagger.
//!
//! Recognised conventions:
//!
//! | specifier                              | class                                   |
//! |----------------------------------------|-----------------------------------------|
//! | `./Clock.js?universal`                 | `Universal`                             |
//! | `./Clock.js?universal&containerless`   | `ContainerlessUniversal`                |
//! | `./Clock.universal.js`                 | `Universal`                             |
//! | any of the above plus `islet-original` | tagged escape hatch (never wrapped)     |
//!
//! Anything else is [`ImportClass::Plain`]. Matching is exact on query
//! parameters and filename segments, so `?universality` or
//! `./universal.js` are plain imports.

/// Query parameter requesting a universal wrapper.
pub const UNIVERSAL_PARAM: &str = "universal";

/// Query parameter selecting the containerless wrapper.
pub const CONTAINERLESS_PARAM: &str = "containerless";

/// Query parameter requesting the unwrapped original module.
pub const ESCAPE_PARAM: &str = "islet-original";

/// Filename segment marking a universal module (`Clock.universal.js`).
pub const UNIVERSAL_INFIX: &str = "universal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    /// Rendered inside a persistent `islet-island` container.
    Universal,
    /// Rendered straight into the parent element.
    ContainerlessUniversal,
}

impl WrapperKind {
    pub fn is_containerless(self) -> bool {
        matches!(self, WrapperKind::ContainerlessUniversal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportClass {
    Plain,
    Tagged {
        kind: WrapperKind,
        /// The real module is requested; it must not be wrapped again.
        escape_hatch: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedImport {
    pub class: ImportClass,
    /// Specifier with islet's query parameters removed. Unrelated query
    /// parameters are kept.
    pub original_path: String,
}

impl ClassifiedImport {
    /// A tagged import that should be replaced with a generated wrapper.
    pub fn wrapper_kind(&self) -> Option<WrapperKind> {
        match self.class {
            ImportClass::Tagged {
                kind,
                escape_hatch: false,
            } => Some(kind),
            _ => None,
        }
    }

    pub fn is_escape_hatch(&self) -> bool {
        matches!(
            self.class,
            ImportClass::Tagged {
                escape_hatch: true,
                ..
            }
        )
    }
}

/// Classify an import specifier. Never fails.
pub fn classify(specifier: &str) -> ClassifiedImport {
    let plain = || ClassifiedImport {
        class: ImportClass::Plain,
        original_path: specifier.to_string(),
    };

    let (path, query) = match specifier.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (specifier, None),
    };
    if path.is_empty() {
        return plain();
    }

    let params: Vec<&str> = query
        .map(|q| q.split('&').filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    let has = |name: &str| params.contains(&name);

    let universal_query = has(UNIVERSAL_PARAM);
    let containerless = universal_query && has(CONTAINERLESS_PARAM);
    let escape_hatch = has(ESCAPE_PARAM);
    let infix = has_universal_infix(path);

    if !(universal_query || infix || escape_hatch) {
        return plain();
    }

    let kind = if containerless {
        WrapperKind::ContainerlessUniversal
    } else {
        WrapperKind::Universal
    };

    let rest: Vec<&str> = params
        .iter()
        .copied()
        .filter(|p| {
            *p != UNIVERSAL_PARAM
                && *p != ESCAPE_PARAM
                && !(universal_query && *p == CONTAINERLESS_PARAM)
        })
        .collect();
    let original_path = if rest.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", rest.join("&"))
    };

    ClassifiedImport {
        class: ImportClass::Tagged { kind, escape_hatch },
        original_path,
    }
}

/// Specifier the generated code uses to reach the real module at `path`.
pub fn escape_specifier(path: &str) -> String {
    format!("{path}?{ESCAPE_PARAM}")
}

/// `Clock.universal.js`: a middle segment of the file name equals `universal`.
fn has_universal_infix(path: &str) -> bool {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let segments: Vec<&str> = file_name.split('.').collect();
    segments.len() >= 3
        && segments[1..segments.len() - 1]
            .iter()
            .any(|segment| *segment == UNIVERSAL_INFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(specifier: &str) -> Option<WrapperKind> {
        classify(specifier).wrapper_kind()
    }

    #[test]
    fn universal_query() {
        assert_eq!(kind_of("./Clock.js?universal"), Some(WrapperKind::Universal));
        assert_eq!(classify("./Clock.js?universal").original_path, "./Clock.js");
    }

    #[test]
    fn containerless_in_either_order() {
        assert_eq!(
            kind_of("./Clock.js?universal&containerless"),
            Some(WrapperKind::ContainerlessUniversal)
        );
        assert_eq!(
            kind_of("./Clock.js?containerless&universal"),
            Some(WrapperKind::ContainerlessUniversal)
        );
    }

    #[test]
    fn filename_infix() {
        assert_eq!(kind_of("./Clock.universal.js"), Some(WrapperKind::Universal));
        assert_eq!(kind_of("/abs/widgets/Map.universal.jsx"), Some(WrapperKind::Universal));
    }

    #[test]
    fn escape_hatch_is_tagged_but_not_wrapped() {
        for specifier in [
            "/src/Clock.js?islet-original",
            "./Clock.js?universal&islet-original",
            "./Clock.universal.js?islet-original",
        ] {
            let classified = classify(specifier);
            assert!(classified.is_escape_hatch(), "{specifier}");
            assert_eq!(classified.wrapper_kind(), None);
        }
        assert_eq!(
            classify("./Clock.js?universal&islet-original").original_path,
            "./Clock.js"
        );
    }

    #[test]
    fn near_misses_are_plain() {
        for specifier in [
            "./Clock.js",
            "./Clock.js?universality",
            "./Clock.js?containerless",
            "./universal.js",
            "./universal",
            "./my-universal.js",
            "universal-pkg",
            "react",
            "?universal",
        ] {
            let classified = classify(specifier);
            assert_eq!(classified.class, ImportClass::Plain, "{specifier}");
            assert_eq!(classified.original_path, specifier);
        }
    }

    #[test]
    fn unrelated_query_parameters_survive() {
        let classified = classify("./Clock.js?raw&universal");
        assert_eq!(classified.wrapper_kind(), Some(WrapperKind::Universal));
        assert_eq!(classified.original_path, "./Clock.js?raw");
    }

    #[test]
    fn escape_specifier_round_trips() {
        let specifier = escape_specifier("/src/Clock.js");
        let classified = classify(&specifier);
        assert!(classified.is_escape_hatch());
        assert_eq!(classified.original_path, "/src/Clock.js");
    }
}
