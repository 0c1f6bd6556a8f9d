use layers::LayerDescriptor;
use layers::symbology::{Classifier, FeatureStyler, classify};

/// Behaviour shared by every adapter, composed into each at construction.
#[derive(Debug, Clone, Copy)]
pub struct EngineDefaults {
    /// Seconds a zoom transition takes. Zero or less jumps immediately.
    pub transition_s: f64,
    /// Fit padding in pixels: top, right, bottom, left.
    pub fit_padding: [f64; 4],
    /// Extra pixels around a marker that still count as a hit.
    pub pick_tolerance_px: f64,
    pub classifier: Classifier,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            transition_s: 1.0,
            fit_padding: [40.0, 40.0, 40.0, 40.0],
            pick_tolerance_px: 2.0,
            classifier: classify,
        }
    }
}

impl EngineDefaults {
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_transition(mut self, seconds: f64) -> Self {
        self.transition_s = seconds;
        self
    }

    /// Style for a vector layer; storm layers delegate to the injected classifier.
    pub fn vector_layer_style(&self, layer: &LayerDescriptor) -> Option<FeatureStyler> {
        FeatureStyler::for_layer(layer, self.classifier)
    }
}
