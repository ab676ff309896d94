//! Static curriculum seed data, the procedure atlas, and focus filters.

use serde::{Deserialize, Serialize};

use crate::topic::TopicNode;

/// One category of the atlas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasCategory {
    /// Category name (e.g. "Ear Cartilage").
    pub category: String,
    /// Procedure names in display order.
    pub piercings: Vec<String>,
}

/// The flat, non-hierarchical catalogue of named procedures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atlas {
    /// Categories in display order.
    pub categories: Vec<AtlasCategory>,
}

impl Atlas {
    /// Every procedure name across all categories, in display order.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.piercings.iter().map(String::as_str))
    }

    /// Returns `true` if `name` is listed in any category.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries().any(|entry| entry == name)
    }
}

fn leaves(items: &[(&str, &str)]) -> Vec<TopicNode> {
    items
        .iter()
        .map(|(id, title)| TopicNode::leaf(*id, *title))
        .collect()
}

/// The built-in curriculum roots.
#[must_use]
pub fn seed_curriculum() -> Vec<TopicNode> {
    vec![
        TopicNode::branch(
            "anatomy-physiology",
            "Anatomy & Physiology",
            vec![
                TopicNode::branch(
                    "ear-anatomy",
                    "Ear Structure",
                    leaves(&[
                        ("cartilage-healing", "Cartilage Healing Dynamics"),
                        ("ear-nerve-endings", "Nerve Bundles & Sensitivity"),
                        ("blood-supply-pinna", "Vascularization of the Pinna"),
                    ]),
                ),
                TopicNode::branch(
                    "oral-anatomy",
                    "Oral Cavity",
                    leaves(&[
                        ("frenulum-variations", "Frenulum Variations"),
                        ("vascular-tongue", "Tongue Vascularity"),
                        ("salivary-ducts", "Salivary Gland Mapping"),
                    ]),
                ),
                TopicNode::branch(
                    "facial-nerves",
                    "Facial Nerve Mapping",
                    leaves(&[
                        ("trigeminal-branching", "Trigeminal Nerve Considerations"),
                        ("supraorbital-vessels", "Supraorbital Vessel Avoidance"),
                    ]),
                ),
            ],
        ),
        TopicNode::branch(
            "jewelry-metallurgy",
            "Jewelry & Metallurgy",
            vec![
                TopicNode::branch(
                    "biocompatibility",
                    "Biocompatible Materials",
                    leaves(&[
                        ("titanium-grades", "Titanium: G5 vs G23 vs F136"),
                        ("niobium-properties", "Niobium & Anodization"),
                        ("gold-karats", "Gold Purity & Nickel Content"),
                    ]),
                ),
                TopicNode::branch(
                    "surface-finish",
                    "Finish & Threading",
                    leaves(&[
                        ("mirror-polish", "The Importance of Mirror Polish"),
                        ("threadless-systems", "Threadless (Press-fit) Mechanics"),
                        ("internal-threading", "Internal vs External Threading"),
                    ]),
                ),
            ],
        ),
        TopicNode::branch(
            "health-safety",
            "Clinical Protocols",
            vec![
                TopicNode::branch(
                    "sterilization",
                    "Sterilization Science",
                    leaves(&[
                        ("autoclave-cycles", "Steam vs Dry Heat Cycles"),
                        ("biological-indicators", "Spore Testing Protocols"),
                        ("ultrasonic-cavitation", "Ultrasonic Cleaning Dynamics"),
                    ]),
                ),
                TopicNode::branch(
                    "cross-contamination",
                    "Aseptic Technique",
                    leaves(&[
                        ("gloving-technique", "Clinical Hand Hygiene & Gloving"),
                        ("barrier-protection", "Barrier Film & Equipment Covers"),
                    ]),
                ),
            ],
        ),
        TopicNode::branch(
            "advanced-piercing",
            "Masterclass Techniques",
            vec![
                TopicNode::branch(
                    "needle-theory",
                    "Advanced Needle Theory",
                    leaves(&[
                        ("freehand-piercing", "Freehand Technical Execution"),
                        ("receiving-tubes", "The Role of Receiving Tubes"),
                        ("transfer-methods", "Needle-to-Jewelry Transfers"),
                    ]),
                ),
                TopicNode::branch(
                    "reconstruction",
                    "Dermal & Surface",
                    leaves(&[
                        ("dermal-removal", "Clinical Dermal Removal"),
                        ("surface-anchors", "Pocketing & Anchoring Theory"),
                    ]),
                ),
            ],
        ),
    ]
}

fn category(name: &str, piercings: &[&str]) -> AtlasCategory {
    AtlasCategory {
        category: name.to_string(),
        piercings: piercings.iter().map(|p| (*p).to_string()).collect(),
    }
}

/// The built-in procedure atlas.
#[must_use]
pub fn piercing_atlas() -> Atlas {
    Atlas {
        categories: vec![
            category(
                "Ear Cartilage",
                &[
                    "Helix",
                    "Forward Helix",
                    "Tragus",
                    "Anti-Tragus",
                    "Conch",
                    "Rook",
                    "Daith",
                    "Industrial",
                    "Snug",
                    "Flat",
                    "Orbital",
                ],
            ),
            category(
                "Ear Lobe",
                &[
                    "Standard Lobe",
                    "Stacked Lobe",
                    "Transverse Lobe",
                    "Stretched Lobe Maintenance",
                ],
            ),
            category(
                "Nose & Face",
                &[
                    "Septum",
                    "Nostril",
                    "High Nostril",
                    "Bridge",
                    "Eyebrow",
                    "Anti-Eyebrow",
                    "Third Eye",
                ],
            ),
            category(
                "Lip & Oral",
                &[
                    "Philtrum (Medusa)",
                    "Labret",
                    "Vertical Labret",
                    "Monroe",
                    "Madonna",
                    "Jestrum",
                    "Ashley",
                    "Vertical Philtrum",
                    "Smiley",
                    "Frowny",
                    "Tongue",
                    "Venom",
                ],
            ),
            category(
                "Body & Genital",
                &[
                    "Navel",
                    "Floating Navel",
                    "Nipple",
                    "Dermal Anchor",
                    "Surface Bar",
                    "Christina",
                    "VCH",
                    "Prince Albert",
                    "Triangle",
                    "Guiche",
                ],
            ),
        ],
    }
}

// ============================================================================
// Focus
// ============================================================================

/// Prefix of ids given to user-submitted custom topics.
pub const CUSTOM_ID_PREFIX: &str = "custom-";

/// Root-level curriculum filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Focus {
    /// Anatomy and clinical protocol roots.
    Clinical,
    /// Materials and aftercare roots.
    Certified,
    /// Technique and business roots plus every custom topic.
    Masterclass,
}

impl Focus {
    /// Parses a focus name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "clinical" => Some(Self::Clinical),
            "certified" => Some(Self::Certified),
            "masterclass" => Some(Self::Masterclass),
            _ => None,
        }
    }

    /// Root ids shown under this focus.
    #[must_use]
    pub const fn root_ids(&self) -> &'static [&'static str] {
        match self {
            Self::Clinical => &["anatomy-physiology", "health-safety"],
            Self::Certified => &["jewelry-materials", "aftercare-healing"],
            Self::Masterclass => &[
                "piercing-techniques",
                "ethics-business",
                "jewelry-metallurgy",
                "advanced-piercing",
            ],
        }
    }

    /// Returns `true` if a root with this id is shown under this focus.
    #[must_use]
    pub fn includes(&self, root_id: &str) -> bool {
        self.root_ids().contains(&root_id)
            || (matches!(self, Self::Masterclass) && root_id.starts_with(CUSTOM_ID_PREFIX))
    }

    /// Heading shown above the filtered tree.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Clinical => "CLINICAL Focus",
            Self::Certified => "CERTIFIED Focus",
            Self::Masterclass => "MASTERCLASS Focus",
        }
    }
}
