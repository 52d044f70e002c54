//! Locator chains for every control the workflow touches on the portal

use action_locator::LocatorChain;

pub const BY_DATE_TAB: &str = "Tarih Bazında Kur Sorgulama";
pub const BY_CURRENCY_TAB: &str = "Döviz Cinsi Bazında Kur Sorgulama";
pub const EXPORT_LABEL: &str = "EXCEL İndir";
pub const LIST_LABEL: &str = "Listele";
pub const CURRENCY_SELECT: &str = "select#edit-kur-kod";

/// Ordered alternatives per logical control.
#[derive(Debug, Clone)]
pub struct PortalSelectors {
    pub overlays: LocatorChain,
    pub by_date_tab: LocatorChain,
    pub by_currency_tab: LocatorChain,
    pub start_date: LocatorChain,
    pub end_date: LocatorChain,
    pub currency: LocatorChain,
    pub list_button: LocatorChain,
    pub results: LocatorChain,
    pub export: LocatorChain,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            overlays: LocatorChain::new("overlay")
                .text("Kabul Et")
                .text("Kabul")
                .text("Tamam")
                .text("Anladım")
                .aria_label("kapat", true)
                .aria_label("kapat", false)
                .text_in(&["button"], "×"),
            by_date_tab: labelled_control("by-date tab", BY_DATE_TAB),
            by_currency_tab: labelled_control("by-currency tab", BY_CURRENCY_TAB),
            start_date: date_field("start date", "Baslangic", "baslangic", "Başlangıç", "start", 0),
            end_date: date_field("end date", "Bitis", "bitis", "Bitiş", "end", 1),
            currency: LocatorChain::new("currency").css(CURRENCY_SELECT),
            list_button: LocatorChain::new("list")
                .text_in(&["button"], LIST_LABEL)
                .input_value("input[type='submit']", LIST_LABEL)
                .text(LIST_LABEL),
            results: LocatorChain::new("results")
                .css("table")
                .css("table tbody tr")
                .text_in(&["div"], "Kayıt")
                .css("div.dataTables_wrapper"),
            export: labelled_control("export", EXPORT_LABEL),
        }
    }
}

fn labelled_control(name: &str, label: &str) -> LocatorChain {
    LocatorChain::new(name)
        .text_in(&["a"], label)
        .text_in(&["button"], label)
        .text(label)
}

/// Start and end chains are zipped pairwise, so both must list their
/// spellings in the same order.
fn date_field(
    name: &str,
    stem: &str,
    snake: &str,
    placeholder: &str,
    english: &str,
    position: usize,
) -> LocatorChain {
    let mut capitalized = english.to_string();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    LocatorChain::new(name)
        .css(format!("input[name*={stem}]"))
        .css(format!("#{stem}Tarihi"))
        .css(format!("#edit-{snake}-tarihi"))
        .css(format!("input[name='{snake}_tarihi']"))
        .css(format!("input[placeholder*='{placeholder}']"))
        .css(format!("input[name*={english}]"))
        .css(format!("input[name*={capitalized}]"))
        .nth("input.hasDatepicker", position)
        .nth("input[type='text']", position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_chains_pair_up() {
        let selectors = PortalSelectors::default();
        assert_eq!(selectors.start_date.len(), selectors.end_date.len());
        let start: Vec<String> = selectors.start_date.queries().map(ToString::to_string).collect();
        let end: Vec<String> = selectors.end_date.queries().map(ToString::to_string).collect();
        assert_eq!(start[0], "input[name*=Baslangic]");
        assert_eq!(end[2], "#edit-bitis-tarihi");
        assert_eq!(start[6], "input[name*=Start]");
        assert_eq!(end.last().map(String::as_str), Some("input[type='text'] >> nth=1"));
    }

    #[test]
    fn overlay_chain_prefers_the_most_specific_text() {
        let selectors = PortalSelectors::default();
        let first = selectors.overlays.queries().next().map(ToString::to_string);
        assert_eq!(first.as_deref(), Some("text=Kabul Et"));
        assert_eq!(selectors.overlays.len(), 7);
    }
}
