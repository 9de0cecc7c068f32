use serde::Serialize;

use crate::context::{Pipeline, StatsContext};
use crate::merge::{GenderShare, MergedFeature};
use crate::query::{ColorScale, SeriesPoint, UrbanRural};
use crate::record::{Locale, SEGMENT_TOTAL};

/// Current filter selection of a map view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub pipeline: Pipeline,
    pub year: u16,
    pub segment: String,
    pub locale: Locale,
}

/// Owns the mutable view state: filter, selected region, hovered region.
/// Mutated only from the owner's event handlers.
#[derive(Debug, Clone)]
pub struct Controller {
    filter: Filter,
    selected: Option<String>,
    hovered: Option<String>,
}

/// Everything a render pass needs, derived from the context and the current
/// state. Rebuilt on every pass.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub filter: Filter,
    pub scale: ColorScale,
    pub features: Vec<MergedFeature>,
    pub selected: Option<SelectionView>,
    pub hovered: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionView {
    pub region: String,
    pub value: Option<f64>,
    pub split: UrbanRural,
    pub series: Vec<SeriesPoint>,
    pub share: Option<GenderShare>,
}

impl Controller {
    pub fn new(pipeline: Pipeline, year: u16) -> Self {
        Self {
            filter: Filter {
                pipeline,
                year,
                segment: SEGMENT_TOTAL.to_string(),
                locale: Locale::National,
            },
            selected: None,
            hovered: None,
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_year(&mut self, year: u16) {
        self.filter.year = year;
    }

    pub fn set_segment(&mut self, segment: impl Into<String>) {
        self.filter.segment = segment.into();
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.filter.locale = locale;
    }

    /// Selects the region `free_text` resolves to, or clears the selection
    /// when that region is already selected. Unresolved text is kept as typed.
    pub fn toggle_selection(&mut self, context: &StatsContext, free_text: &str) -> Option<&str> {
        let region = context
            .resolve(self.filter.pipeline, free_text, &self.filter.segment)
            .unwrap_or_else(|| free_text.to_string());
        if self.selected.as_deref() == Some(region.as_str()) {
            self.selected = None;
        } else {
            self.selected = Some(region);
        }
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn hover(&mut self, region: Option<&str>) {
        self.hovered = region.map(str::to_string);
    }

    pub fn reset(&mut self) {
        self.selected = None;
        self.hovered = None;
    }

    pub fn render(&self, context: &StatsContext) -> View {
        let dataset = context.dataset(self.filter.pipeline);
        let features = context.merged();
        let selected = self.selected.clone().map(|region| {
            let share = features
                .iter()
                .find(|feature| feature.region.as_deref() == Some(region.as_str()))
                .and_then(MergedFeature::gender_share);
            SelectionView {
                value: dataset.value_at(&region, self.filter.year, &self.filter.segment, self.filter.locale),
                split: dataset.urban_rural_split(&region, self.filter.year, &self.filter.segment),
                series: dataset.temporal_series(&region, &self.filter.segment, self.filter.locale),
                share,
                region,
            }
        });
        View {
            filter: self.filter.clone(),
            scale: dataset.color_scale_stats(self.filter.year, &self.filter.segment),
            features: features.iter().map(MergedFeature::without_geometry).collect(),
            selected,
            hovered: self.hovered.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::GeoFeature;
    use crate::matcher::MatchPolicy;
    use crate::query::Dataset;
    use crate::record::RetireeRecord;
    use crate::schema::Schema;

    fn context() -> StatsContext {
        StatsContext::from_parts(
            vec![GeoFeature {
                name: "L'Oriental".to_string(),
                geometry: serde_json::Value::Null,
            }],
            vec![RetireeRecord {
                region: "Oriental".to_string(),
                masculin: 4000.0,
                feminin: 2000.0,
                total: 6000.0,
            }],
            Dataset::from_rows(&[], Schema::unemployment()),
            MatchPolicy::First,
        )
    }

    #[test]
    fn selecting_twice_clears() {
        let context = context();
        let mut controller = Controller::new(Pipeline::Retirees, 2022);
        assert_eq!(controller.toggle_selection(&context, "Oriental"), Some("Oriental"));
        assert_eq!(controller.toggle_selection(&context, "Oriental"), None);
        controller.toggle_selection(&context, "Souss-Massa");
        controller.hover(Some("Oriental"));
        controller.reset();
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn spellings_of_one_region_toggle_the_same_selection() {
        let context = context();
        let mut controller = Controller::new(Pipeline::Retirees, 2022);
        assert_eq!(controller.toggle_selection(&context, "L'Oriental"), Some("Oriental"));
        assert_eq!(controller.toggle_selection(&context, "Oriental"), None);
        assert_eq!(controller.toggle_selection(&context, "Atlantis"), Some("Atlantis"));
        assert_eq!(controller.toggle_selection(&context, "Atlantis"), None);
    }

    #[test]
    fn render_reflects_filter_and_selection() {
        let context = context();
        let mut controller = Controller::new(Pipeline::Retirees, 2022);
        controller.toggle_selection(&context, "L'Oriental");
        let view = controller.render(&context);
        let selected = view.selected.unwrap();
        assert_eq!(selected.region, "Oriental");
        assert_eq!(selected.value, Some(6000.0));
        assert_eq!(selected.share.unwrap().feminin_pct, 33.3);
        assert_eq!(view.scale.max, 6000.0);

        controller.set_segment("Féminin");
        assert_eq!(controller.filter().segment, "Féminin");
        let view = controller.render(&context);
        assert_eq!(view.selected.unwrap().value, Some(2000.0));
    }

    #[test]
    fn render_on_unemployment_uses_synthetic_values() {
        let context = context();
        let mut controller = Controller::new(Pipeline::Unemployment, 2023);
        controller.toggle_selection(&context, "Fes-Meknes");
        controller.set_locale(Locale::National);
        let selected = controller.render(&context).selected.unwrap();
        assert_eq!(selected.region, "Fès-Meknès");
        assert_eq!(selected.value, Some(13.7));
        assert_eq!(selected.series.len(), 9);
    }
}
