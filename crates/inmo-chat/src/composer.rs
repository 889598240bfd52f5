//! Prompt composition for the completion gateway.
//!
//! The composer picks one of four shapes depending on what the pipeline
//! found: a single listing in detail, a list of matches, an empty search, or
//! no search at all.

use std::fmt::Write;

use inmo_core::config::ChatConfig;
use inmo_core::types::{CatalogFacets, FilterSet, Listing};

const ASSISTANT_ROLE: &str =
    "Sos un asistente inmobiliario de Buenos Aires. Respondé siempre en español rioplatense.";

const NOT_AVAILABLE: &str = "No disponible";

/// Tone requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleHint {
    /// Short and warm, for chat apps.
    Brief,
    /// Explanatory and professional.
    Explanatory,
}

impl StyleHint {
    pub fn for_channel(channel: &str) -> Self {
        if channel.trim().eq_ignore_ascii_case("whatsapp") {
            StyleHint::Brief
        } else {
            StyleHint::Explanatory
        }
    }

    pub fn directive(&self) -> &'static str {
        match self {
            StyleHint::Brief => {
                "Respondé de forma breve, directa y cálida, como en un mensaje de WhatsApp."
            }
            StyleHint::Explanatory => {
                "Respondé de forma explicativa, profesional y cálida, como en una consulta web."
            }
        }
    }
}

/// Everything the composer needs for one prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub user_text: &'a str,
    /// `None` when no search ran, `Some(&[])` when it found nothing.
    pub listings: Option<&'a [Listing]>,
    /// Set when the user asked about one specific listing.
    pub detail: Option<&'a Listing>,
    pub filters: &'a FilterSet,
    pub channel: &'a str,
    pub facets: &'a CatalogFacets,
    /// Recent user messages on this channel, oldest first.
    pub history: &'a [String],
}

#[derive(Debug, Clone)]
pub struct ResponseComposer {
    max_listings: usize,
    description_chars: usize,
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new(&ChatConfig::default())
    }
}

impl ResponseComposer {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            max_listings: config.max_listings_in_prompt.max(1),
            description_chars: config.description_preview_chars,
        }
    }

    pub fn compose(&self, ctx: &PromptContext<'_>) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "{}", ASSISTANT_ROLE);
        let _ = writeln!(prompt, "{}", StyleHint::for_channel(ctx.channel).directive());
        write_history(&mut prompt, ctx.history);
        let _ = writeln!(prompt, "\nConsulta del usuario: \"{}\"", ctx.user_text);

        match (ctx.detail, ctx.listings) {
            (Some(listing), _) => self.write_detail(&mut prompt, listing),
            (None, Some(listings)) if !listings.is_empty() => {
                self.write_results(&mut prompt, listings, ctx.filters)
            }
            (None, Some(_)) => write_no_results(&mut prompt, ctx.filters),
            (None, None) => write_general(&mut prompt, ctx.facets),
        }

        prompt
    }

    fn write_results(&self, prompt: &mut String, listings: &[Listing], filters: &FilterSet) {
        let _ = writeln!(prompt, "Filtros aplicados: {}", describe_filters(filters));
        let _ = writeln!(
            prompt,
            "\nEncontré {} propiedades. Estas son las primeras {}:",
            listings.len(),
            listings.len().min(self.max_listings)
        );

        for (i, l) in listings.iter().take(self.max_listings).enumerate() {
            let _ = writeln!(
                prompt,
                "{}. {} | Barrio: {} | Precio: {} {} | {} ambientes | {} m² | {} | {} | {}",
                i + 1,
                l.title,
                l.neighborhood,
                l.price_currency,
                format_amount(l.price),
                l.rooms,
                format_amount(l.area_sqm),
                l.operation,
                l.kind,
                preview(&l.description, self.description_chars),
            );
        }

        prompt.push_str(
            "\nPresentá estas opciones como una lista numerada, sin viñetas, \
             destacando precio, barrio y ambientes. Invitá al usuario a pedir \
             más detalles de la que le interese.\n",
        );
    }

    fn write_detail(&self, prompt: &mut String, l: &Listing) {
        let text = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let count = |items: &[String]| {
            if items.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                items.len().to_string()
            }
        };

        prompt.push_str("\nEl usuario pide detalles de esta propiedad:\n");
        let fields = [
            ("Título", l.title.clone()),
            ("Barrio", l.neighborhood.clone()),
            ("Dirección", text(&l.address)),
            ("Operación", l.operation.clone()),
            ("Tipo", l.kind.clone()),
            ("Precio", format!("{} {}", l.price_currency, format_amount(l.price))),
            ("Ambientes", l.rooms.to_string()),
            ("Superficie", format!("{} m²", format_amount(l.area_sqm))),
            (
                "Antigüedad",
                l.age_years
                    .map(|y| format!("{} años", y))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ),
            ("Estado", text(&l.condition)),
            ("Orientación", text(&l.orientation)),
            (
                "Expensas",
                l.monthly_fee
                    .map(|f| format!("{} {}", l.monthly_fee_currency, format_amount(f)))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ),
            ("Amenities", text(&l.amenities)),
            ("Cochera", text(&l.garage)),
            ("Balcón", text(&l.balcony)),
            ("Pileta", text(&l.pool)),
            ("Acepta mascotas", text(&l.pets_allowed)),
            ("Aire acondicionado", text(&l.air_conditioning)),
            ("Fotos", count(&l.photos)),
            ("Videos", count(&l.videos)),
            ("Documentos", count(&l.documents)),
            ("Información multimedia", text(&l.media_info)),
        ];
        for (label, value) in fields {
            let _ = writeln!(prompt, "- {}: {}", label, value);
        }
        if !l.description.is_empty() {
            let _ = writeln!(prompt, "- Descripción: {}", l.description);
        }

        prompt.push_str(
            "\nPresentá todos estos datos de forma ordenada. Si un dato figura como \
             \"No disponible\", mencionalo así, sin inventar información.\n",
        );
    }
}

fn write_history(prompt: &mut String, history: &[String]) {
    if history.is_empty() {
        return;
    }
    prompt.push_str("\nHistorial reciente:\n");
    for message in history {
        let _ = writeln!(prompt, "- {}", message);
    }
}

fn write_no_results(prompt: &mut String, filters: &FilterSet) {
    let _ = writeln!(prompt, "Filtros aplicados: {}", describe_filters(filters));
    prompt.push_str(
        "\nNo se encontraron propiedades con esos criterios. Disculpate con el \
         usuario y sugerile ampliar la búsqueda: otro barrio, un precio mayor o \
         menos ambientes.\n",
    );
}

fn write_general(prompt: &mut String, facets: &CatalogFacets) {
    prompt.push_str(
        "\nNo se realizó ninguna búsqueda. Respondé la consulta de forma general.\n",
    );
    let lists = [
        ("Barrios disponibles", &facets.neighborhoods),
        ("Tipos de propiedad", &facets.kinds),
        ("Operaciones disponibles", &facets.operations),
    ];
    for (label, values) in lists {
        if !values.is_empty() {
            let _ = writeln!(prompt, "{}: {}", label, values.join(", "));
        }
    }
    prompt.push_str(
        "Si corresponde, invitá al usuario a indicar barrio, tipo de propiedad, \
         operación o presupuesto para buscar opciones.\n",
    );
}

/// Human-readable summary of the active predicates.
pub fn describe_filters(filters: &FilterSet) -> String {
    let mut parts = Vec::new();
    if let Some(n) = &filters.neighborhood {
        parts.push(format!("barrio {}", n));
    }
    if let Some(k) = &filters.kind {
        parts.push(format!("tipo {}", k));
    }
    if let Some(o) = &filters.operation {
        parts.push(format!("operación {}", o));
    }
    if let Some(p) = filters.min_price {
        parts.push(format!("precio desde {}", format_amount(p)));
    }
    if let Some(p) = filters.max_price {
        parts.push(format!("precio hasta {}", format_amount(p)));
    }
    if let Some(r) = filters.min_rooms {
        parts.push(format!("al menos {} ambientes", r));
    }
    if let Some(a) = filters.min_area {
        parts.push(format!("desde {} m²", format_amount(a)));
    }
    if let Some(a) = filters.max_area {
        parts.push(format!("hasta {} m²", format_amount(a)));
    }

    if parts.is_empty() {
        "ninguno".to_string()
    } else {
        parts.join(", ")
    }
}

/// Whole amount with `.` thousands separators, e.g. `1.250.000`.
pub fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inmo_core::types::{OperationKind, PropertyKind};

    fn listing(id: &str, price: f64) -> Listing {
        Listing::new(
            id,
            format!("Depto {}", id),
            "Palermo",
            price,
            OperationKind::Sale,
            PropertyKind::Apartment,
        )
        .with_rooms(2)
        .with_area(45.0)
    }

    fn ctx<'a>(
        listings: Option<&'a [Listing]>,
        detail: Option<&'a Listing>,
        filters: &'a FilterSet,
        facets: &'a CatalogFacets,
    ) -> PromptContext<'a> {
        PromptContext {
            user_text: "busco depto",
            listings,
            detail,
            filters,
            channel: "web",
            facets,
            history: &[],
        }
    }

    #[test]
    fn test_style_hint_for_channel() {
        assert_eq!(StyleHint::for_channel("whatsapp"), StyleHint::Brief);
        assert_eq!(StyleHint::for_channel("WhatsApp"), StyleHint::Brief);
        assert_eq!(StyleHint::for_channel("web"), StyleHint::Explanatory);
        assert_eq!(StyleHint::for_channel("telegram"), StyleHint::Explanatory);
    }

    #[test]
    fn test_results_branch_caps_listings() {
        let listings: Vec<Listing> = (0..8)
            .map(|i| listing(&format!("{}", i), 1000.0 + i as f64))
            .collect();
        let filters = FilterSet::default();
        let facets = CatalogFacets::default();
        let context = ctx(Some(listings.as_slice()), None, &filters, &facets);
        let prompt = ResponseComposer::default().compose(&context);

        assert!(prompt.contains("Encontré 8 propiedades"));
        assert!(prompt.contains("6. Depto 5"));
        assert!(!prompt.contains("7. Depto 6"));
        assert!(prompt.contains("lista numerada, sin viñetas"));
    }

    #[test]
    fn test_results_branch_truncates_description() {
        let long = "a".repeat(100);
        let listings = vec![listing("x", 1.0).with_description(long.clone())];
        let filters = FilterSet::default();
        let facets = CatalogFacets::default();
        let context = ctx(Some(listings.as_slice()), None, &filters, &facets);
        let prompt = ResponseComposer::default().compose(&context);

        assert!(prompt.contains(&format!("{}...", "a".repeat(60))));
        assert!(!prompt.contains(&long));
    }

    #[test]
    fn test_empty_results_branch() {
        let filters = FilterSet {
            neighborhood: Some("palermo".to_string()),
            ..FilterSet::default()
        };
        let facets = CatalogFacets::default();
        let context = ctx(Some(&[][..]), None, &filters, &facets);
        let prompt = ResponseComposer::default().compose(&context);

        assert!(prompt.contains("No se encontraron propiedades"));
        assert!(prompt.contains("barrio palermo"));
    }

    #[test]
    fn test_general_branch_lists_facets() {
        let filters = FilterSet::default();
        let facets = CatalogFacets {
            neighborhoods: vec!["palermo".to_string(), "belgrano".to_string()],
            kinds: vec!["casa".to_string()],
            operations: vec!["venta".to_string()],
        };
        let prompt = ResponseComposer::default().compose(&ctx(None, None, &filters, &facets));

        assert!(prompt.contains("No se realizó ninguna búsqueda"));
        assert!(prompt.contains("Barrios disponibles: palermo, belgrano"));
        assert!(prompt.contains("Tipos de propiedad: casa"));
    }

    #[test]
    fn test_detail_branch_marks_missing_fields() {
        let mut detail = listing("d", 250000.0);
        detail.garage = Some("si".to_string());
        let filters = FilterSet::default();
        let facets = CatalogFacets::default();
        let listings = vec![detail.clone()];
        let prompt = ResponseComposer::default().compose(&ctx(
            Some(listings.as_slice()),
            Some(&detail),
            &filters,
            &facets,
        ));

        assert!(prompt.contains("- Cochera: si"));
        assert!(prompt.contains("- Pileta: No disponible"));
        assert!(prompt.contains("- Precio: USD 250.000"));
        assert!(!prompt.contains("Encontré"));
    }

    #[test]
    fn test_history_and_channel_style() {
        let filters = FilterSet::default();
        let facets = CatalogFacets::default();
        let history = vec!["hola".to_string(), "busco casa".to_string()];
        let context = PromptContext {
            channel: "whatsapp",
            history: &history,
            ..ctx(None, None, &filters, &facets)
        };
        let prompt = ResponseComposer::default().compose(&context);

        assert!(prompt.contains("WhatsApp"));
        assert!(prompt.contains("Historial reciente:\n- hola\n- busco casa\n"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1000.0), "1.000");
        assert_eq!(format_amount(1250000.4), "1.250.000");
    }

    #[test]
    fn test_describe_filters() {
        assert_eq!(describe_filters(&FilterSet::default()), "ninguno");
        let f = FilterSet {
            max_price: Some(200000.0),
            min_rooms: Some(2),
            ..FilterSet::default()
        };
        assert_eq!(describe_filters(&f), "precio hasta 200.000, al menos 2 ambientes");
    }
}
