use std::path::Path;
use std::sync::Arc;

use resvg::usvg;

/// Generic families resolved against whatever fonts are installed.
#[derive(Debug, Default, PartialEq, Eq)]
struct FallbackFamilies {
    sans: Option<String>,
    serif: Option<String>,
    mono: Option<String>,
}

fn pick_fallbacks<'a>(families: impl Iterator<Item = &'a str>) -> FallbackFamilies {
    let mut sans_family: Option<String> = None;
    let mut serif_family: Option<String> = None;
    let mut mono_family: Option<String> = None;
    let mut first_family: Option<String> = None;

    for family in families {
        if first_family.is_none() {
            first_family = Some(family.to_string());
        }

        let lower = family.to_ascii_lowercase();
        if sans_family.is_none() && lower.contains("sans") {
            sans_family = Some(family.to_string());
        }
        if serif_family.is_none() && lower.contains("serif") && !lower.contains("sans") {
            serif_family = Some(family.to_string());
        }
        if mono_family.is_none() && (lower.contains("mono") || lower.contains("code")) {
            mono_family = Some(family.to_string());
        }
    }

    FallbackFamilies {
        mono: mono_family
            .or_else(|| sans_family.clone())
            .or_else(|| first_family.clone()),
        serif: serif_family.or_else(|| first_family.clone()),
        sans: sans_family.or(first_family),
    }
}

/// System fonts plus any fonts found in `local_dir`, with generic families set.
pub fn load_fontdb(local_dir: &Path) -> Arc<usvg::fontdb::Database> {
    let mut fontdb = usvg::fontdb::Database::new();
    fontdb.load_system_fonts();
    if local_dir.is_dir() {
        fontdb.load_fonts_dir(local_dir);
    }

    let fallbacks = pick_fallbacks(
        fontdb
            .faces()
            .flat_map(|face| face.families.iter().map(|(family, _)| family.as_str())),
    );
    if let Some(family) = &fallbacks.sans {
        fontdb.set_sans_serif_family(family.as_str());
    }
    if let Some(family) = &fallbacks.serif {
        fontdb.set_serif_family(family.as_str());
    }
    if let Some(family) = &fallbacks.mono {
        fontdb.set_monospace_family(family.as_str());
    }

    tracing::debug!(faces = fontdb.len(), ?fallbacks, "font database loaded");
    Arc::new(fontdb)
}

/// Same as [`load_fontdb`] for the usvg version bundled with svg2pdf.
pub fn load_pdf_fontdb(local_dir: &Path) -> Arc<svg2pdf::usvg::fontdb::Database> {
    let mut fontdb = svg2pdf::usvg::fontdb::Database::new();
    fontdb.load_system_fonts();
    if local_dir.is_dir() {
        fontdb.load_fonts_dir(local_dir);
    }

    let fallbacks = pick_fallbacks(
        fontdb
            .faces()
            .flat_map(|face| face.families.iter().map(|(family, _)| family.as_str())),
    );
    if let Some(family) = &fallbacks.sans {
        fontdb.set_sans_serif_family(family.as_str());
    }
    if let Some(family) = &fallbacks.serif {
        fontdb.set_serif_family(family.as_str());
    }
    if let Some(family) = &fallbacks.mono {
        fontdb.set_monospace_family(family.as_str());
    }

    Arc::new(fontdb)
}

#[cfg(test)]
mod tests {
    use super::pick_fallbacks;

    #[test]
    fn picks_matching_families() {
        let picked = pick_fallbacks(
            ["Inter", "Noto Sans", "Noto Serif", "JetBrains Mono"].into_iter(),
        );
        assert_eq!(picked.sans.as_deref(), Some("Noto Sans"));
        assert_eq!(picked.serif.as_deref(), Some("Noto Serif"));
        assert_eq!(picked.mono.as_deref(), Some("JetBrains Mono"));
    }

    #[test]
    fn falls_back_to_first_family() {
        let picked = pick_fallbacks(["Inter", "Roboto"].into_iter());
        assert_eq!(picked.sans.as_deref(), Some("Inter"));
        assert_eq!(picked.serif.as_deref(), Some("Inter"));
        assert_eq!(picked.mono.as_deref(), Some("Inter"));
    }

    #[test]
    fn mono_prefers_sans_over_first() {
        let picked = pick_fallbacks(["Inter", "Open Sans"].into_iter());
        assert_eq!(picked.mono.as_deref(), Some("Open Sans"));
    }

    #[test]
    fn empty_database_has_no_fallbacks() {
        assert_eq!(pick_fallbacks(std::iter::empty()), Default::default());
    }
}
