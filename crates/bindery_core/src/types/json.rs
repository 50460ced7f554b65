pub type JSONObject = serde_json::Map<String, serde_json::Value>;
