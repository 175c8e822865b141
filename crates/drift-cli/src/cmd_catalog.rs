use crate::context::{print_json, Context};
use drift_core::{AspectDescriptor, AspectKind, FingerprintCatalog};

/// Execute `drift catalog`
pub fn execute(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let catalog = ctx.catalog()?;
    if json {
        let aspects: Vec<&AspectDescriptor> = catalog.iter().collect();
        return print_json(&aspects);
    }
    print!("{}", render(&catalog));
    Ok(())
}

fn render(catalog: &FingerprintCatalog) -> String {
    let mut out = String::new();
    for aspect in catalog.iter() {
        out.push_str(&format!(
            "{:<32} {:<12} {}\n",
            aspect.name,
            kind_label(&aspect.kind),
            aspect.label()
        ));
    }
    let categories = catalog.by_category();
    if !categories.is_empty() {
        out.push_str("\nCategories:\n");
        for (category, aspects) in categories {
            let names: Vec<&str> = aspects.iter().map(|a| a.name.as_str()).collect();
            out.push_str(&format!("  {category}: {}\n", names.join(", ")));
        }
    }
    out
}

fn kind_label(kind: &AspectKind) -> &'static str {
    match kind {
        AspectKind::Fingerprint => "fingerprint",
        AspectKind::Glob { .. } => "glob",
        AspectKind::Classification => "classify",
        AspectKind::Review => "review",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::{glob_aspect, RegistryConfig};

    #[test]
    fn lists_every_aspect() {
        let catalog = FingerprintCatalog::standard(&RegistryConfig::default()).unwrap();
        let text = render(&catalog);
        assert_eq!(
            text.lines().take_while(|l| !l.is_empty()).count(),
            catalog.len()
        );
    }

    #[test]
    fn glob_aspects_are_labelled() {
        let catalog =
            FingerprintCatalog::from_descriptors(vec![glob_aspect("jsp-files", "JSP files", "**/*.jsp")])
                .unwrap();
        let text = render(&catalog);
        assert!(text.starts_with("jsp-files"));
        assert!(text.contains(" glob "));
        assert!(!text.contains("Categories:"));
    }
}
