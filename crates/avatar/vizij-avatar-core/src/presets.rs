//! Static emotion preset table (channel name -> value at intensity 1.0).

#[derive(Debug, PartialEq)]
pub struct EmotionPreset {
    pub name: &'static str,
    pub channels: &'static [(&'static str, f32)],
}

pub const EMOTION_PRESETS: &[EmotionPreset] = &[
    EmotionPreset {
        name: "happy",
        channels: &[("Fcl_HAP_HAP", 0.8), ("Fcl_SAD_SAD", 0.0)],
    },
    EmotionPreset {
        name: "sad",
        channels: &[("Fcl_HAP_HAP", 0.0), ("Fcl_SAD_SAD", 0.7)],
    },
    EmotionPreset {
        name: "angry",
        channels: &[("Fcl_ANG_ANG", 0.8)],
    },
    EmotionPreset {
        name: "surprised",
        channels: &[("Fcl_SUR_SUR", 0.8)],
    },
    EmotionPreset {
        name: "neutral",
        channels: &[
            ("Fcl_HAP_HAP", 0.0),
            ("Fcl_SAD_SAD", 0.0),
            ("Fcl_ANG_ANG", 0.0),
            ("Fcl_SUR_SUR", 0.0),
        ],
    },
];

/// Case-insensitive lookup.
pub fn emotion_preset(name: &str) -> Option<&'static EmotionPreset> {
    EMOTION_PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
}

pub fn emotion_names() -> impl Iterator<Item = &'static str> {
    EMOTION_PRESETS.iter().map(|p| p.name)
}
