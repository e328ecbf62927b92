/// Class list the leaf model was trained on, `Crop___Disease` per entry.
pub const CLASS_NAMES: [&str; 38] = [
    "Apple___Apple_scab",
    "Apple___Black_rot",
    "Apple___Cedar_apple_rust",
    "Apple___healthy",
    "Blueberry___healthy",
    "Cherry_(including_sour)___Powdery_mildew",
    "Cherry_(including_sour)___healthy",
    "Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot",
    "Corn_(maize)___Common_rust_",
    "Corn_(maize)___Northern_Leaf_Blight",
    "Corn_(maize)___healthy",
    "Grape___Black_rot",
    "Grape___Esca_(Black_Measles)",
    "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)",
    "Grape___healthy",
    "Orange___Haunglongbing_(Citrus_greening)",
    "Peach___Bacterial_spot",
    "Peach___healthy",
    "Pepper,_bell___Bacterial_spot",
    "Pepper,_bell___healthy",
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
    "Raspberry___healthy",
    "Soybean___healthy",
    "Squash___Powdery_mildew",
    "Strawberry___Leaf_scorch",
    "Strawberry___healthy",
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___healthy",
];

/// Label emitted by the degraded classifier.
pub const LABEL_UNKNOWN: &str = "unknown";
/// Label recorded for an image whose inference call failed.
pub const LABEL_ERROR: &str = "error";

/// Splits a raw class label into display-ready (crop, disease) parts.
pub fn parse_class_label(label: &str) -> (String, String) {
    let mut parts = label.splitn(2, "___");
    let crop_raw = parts.next().unwrap_or(label);
    let disease_raw = parts.next();

    match disease_raw {
        Some(disease_raw) => {
            let crop = normalize_crop(&title_case(&crop_raw.replace('_', " ")));
            let disease = title_case(disease_raw.replace('_', " ").trim());
            (crop, disease)
        }
        // Reserved labels ("unknown", "error") carry no crop part.
        None => ("Unknown".to_string(), label.to_string()),
    }
}

pub fn is_healthy(disease: &str) -> bool {
    disease.to_lowercase().contains("healthy")
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}

fn normalize_crop(crop: &str) -> String {
    match crop {
        "Corn (Maize)" => "Maize".to_string(),
        "Cherry (Including Sour)" => "Cherry".to_string(),
        "Pepper, Bell" => "Bell Pepper".to_string(),
        other => other.to_string(),
    }
}
