//! 作業指示書（ワークオーダー）のモデルと読み込み。

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// BOM（必要資材リスト）の1項目。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillOfMaterialItem {
    /// 資材の識別子（バーコード値と照合する）。
    pub item_id: String,
    /// 表示用の説明。
    pub description: String,
    /// 数量。
    pub quantity: u32,
}

/// 安全チェックリストの1項目。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// 安定ID。
    pub id: String,
    /// 確認内容の文言。
    pub prompt: String,
    /// 完了フラグ（作成時は常に未完了）。
    #[serde(default)]
    pub completed: bool,
}

/// 作業指示書パケット。読み込み後は不変として扱う。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderPacket {
    /// 指示書の安定ID。
    pub id: String,
    /// 指示書番号（例: GAS-MAIN-2024-001）。
    pub work_order_number: String,
    /// 作業内容。
    pub task: String,
    /// 予定地点。
    pub location: String,
    /// 必要資材リスト。
    pub bill_of_materials: Vec<BillOfMaterialItem>,
    /// 安全チェックリスト。
    pub safety_checklist: Vec<ChecklistItem>,
}

impl WorkOrderPacket {
    /// 指定IDがBOMに含まれるか判定する（完全一致のみ）。
    pub fn bom_contains(&self, item_id: &str) -> bool {
        // 部分一致や曖昧照合はしない。
        self.bill_of_materials.iter().any(|b| b.item_id == item_id)
    }
}

/// JSONの必須文字列フィールドを取り出す。
fn str_field(v: &serde_json::Value, name: &str) -> Result<String> {
    // 欠落・空文字はどちらも検証エラーとする。
    match v.get(name).and_then(|f| f.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(anyhow!("invalid work order file: missing field '{name}'")),
    }
}

/// JSONテキストから作業指示書を読み込む。
///
/// 完全形式 {id, workOrderNumber, task, location, billOfMaterials[],
/// safetyChecklist[]} と、旧形式 {workOrder, task, location} を受け付ける。
/// 検証に失敗した場合は既存の状態を変えずにエラーを返す。
pub fn import_from_str(text: &str) -> Result<WorkOrderPacket> {
    // まず素のJSONとしてパースする。
    let v: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| anyhow!("failed to parse work order JSON: {e}"))?;

    if v.get("workOrderNumber").is_some() {
        // 完全形式：必須フィールドを個別に検証する。
        str_field(&v, "id")?;
        str_field(&v, "workOrderNumber")?;
        str_field(&v, "task")?;
        str_field(&v, "location")?;
        for list in ["billOfMaterials", "safetyChecklist"] {
            if !v.get(list).map(|f| f.is_array()).unwrap_or(false) {
                return Err(anyhow!("invalid work order file: missing field '{list}'"));
            }
        }
        // 形が揃っていれば型付きで読み直す。
        let mut wo: WorkOrderPacket = serde_json::from_value(v)
            .map_err(|e| anyhow!("invalid work order file: {e}"))?;
        // チェックリストは常に未完了で始める。
        for item in &mut wo.safety_checklist {
            item.completed = false;
        }
        Ok(wo)
    } else if v.get("workOrder").is_some() {
        // 旧形式：番号・作業・地点のみの簡易ファイル。
        let number = str_field(&v, "workOrder")?;
        let task = str_field(&v, "task")?;
        let location = str_field(&v, "location")?;
        Ok(WorkOrderPacket {
            id: format!("wo-import-{}", number.to_lowercase()),
            work_order_number: number,
            task,
            location,
            bill_of_materials: vec![],
            safety_checklist: vec![],
        })
    } else {
        Err(anyhow!(
            "invalid work order file: missing required fields (workOrderNumber or workOrder)"
        ))
    }
}

/// デモ用の固定カタログ（3件）を返す。
pub fn mock_work_orders() -> Vec<WorkOrderPacket> {
    // 現場デモと同じ内容のガス・電気・水道の3件。
    vec![
        WorkOrderPacket {
            id: "wo-gas-123".into(),
            work_order_number: "GAS-MAIN-2024-001".into(),
            task: "Gas Main Replacement".into(),
            location: "Corner of 5th Ave & Elm St".into(),
            bill_of_materials: vec![
                bom("GASPIPE-HDPE-4IN", "4\" HDPE Gas Pipe, 200ft", 1),
                bom("VALVE-GAS-4IN-PE", "4\" PE Ball Valve", 2),
                bom("FITTING-TEE-4IN", "4\" Electrofusion Tee", 1),
            ],
            safety_checklist: vec![
                check("gas-check-1", "Site safety briefing complete?"),
                check("gas-check-2", "Gas detectors calibrated and active?"),
                check("gas-check-3", "Excavation area marked and clear?"),
            ],
        },
        WorkOrderPacket {
            id: "wo-elec-456".into(),
            work_order_number: "ELEC-TR-2024-002".into(),
            task: "Transformer Replacement".into(),
            location: "1234 Powerline Rd".into(),
            bill_of_materials: vec![
                bom("XFMR-PAD-50KVA", "50kVA Pad-Mounted Transformer", 1),
                bom("CABLE-PRI-15KV", "15kV Primary Cable, 50ft", 1),
                bom("CONNECTOR-LUG-AL", "Aluminum Lug Connector", 4),
            ],
            safety_checklist: vec![
                check("elec-check-1", "Lock-out/Tag-out procedures followed?"),
                check("elec-check-2", "Arc-flash PPE inspected and worn?"),
                check("elec-check-3", "Grounding equipment in place?"),
            ],
        },
        WorkOrderPacket {
            id: "wo-water-789".into(),
            work_order_number: "WATER-SVC-2024-003".into(),
            task: "New Water Service Installation".into(),
            location: "789 Aqua Ln".into(),
            bill_of_materials: vec![
                bom("PIPE-COPPER-1IN", "1\" Copper Pipe, 50ft", 1),
                bom("METER-WATER-5/8", "5/8\" Water Meter", 1),
            ],
            safety_checklist: vec![
                check("water-check-1", "Confined space entry plan reviewed?"),
                check("water-check-2", "Shoring for trench inspected?"),
            ],
        },
    ]
}

/// BOM項目を組み立てる。
fn bom(item_id: &str, description: &str, quantity: u32) -> BillOfMaterialItem {
    BillOfMaterialItem {
        item_id: item_id.into(),
        description: description.into(),
        quantity,
    }
}

/// チェックリスト項目を未完了状態で組み立てる。
fn check(id: &str, prompt: &str) -> ChecklistItem {
    ChecklistItem {
        id: id.into(),
        prompt: prompt.into(),
        completed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_full_form() {
        // 完全形式のファイルを受理することを検証する。
        let text = r#"{
            "id": "wo-x",
            "workOrderNumber": "GAS-MAIN-2024-001",
            "task": "Gas Main Replacement",
            "location": "5th & Elm",
            "billOfMaterials": [
                {"itemId": "GASPIPE-HDPE-4IN", "description": "pipe", "quantity": 1}
            ],
            "safetyChecklist": [
                {"id": "c1", "prompt": "Briefing done?", "completed": true}
            ]
        }"#;
        let wo = import_from_str(text).unwrap();
        assert_eq!(wo.work_order_number, "GAS-MAIN-2024-001");
        assert!(wo.bom_contains("GASPIPE-HDPE-4IN"));
        // 読み込み時にチェックリストは未完了へ戻る。
        assert!(!wo.safety_checklist[0].completed);
    }

    #[test]
    fn test_import_legacy_form() {
        // 旧形式（番号・作業・地点のみ）を受理することを検証する。
        let text = r#"{"workOrder": "WO-42", "task": "Valve swap", "location": "Main St"}"#;
        let wo = import_from_str(text).unwrap();
        assert_eq!(wo.work_order_number, "WO-42");
        assert!(wo.bill_of_materials.is_empty());
        assert!(wo.safety_checklist.is_empty());
    }

    #[test]
    fn test_import_rejects_missing_fields() {
        // 必須フィールド欠落の拒否を検証する。
        for text in [
            r#"{"task": "t", "location": "l"}"#,
            r#"{"workOrder": "WO-1", "location": "l"}"#,
            r#"{"workOrder": "WO-1", "task": "t", "location": ""}"#,
            r#"{"id": "x", "workOrderNumber": "W", "task": "t", "location": "l"}"#,
        ] {
            assert!(import_from_str(text).is_err(), "should reject: {text}");
        }
    }

    #[test]
    fn test_import_rejects_malformed_json() {
        // JSONとして壊れたファイルの拒否を検証する。
        assert!(import_from_str("not json at all").is_err());
    }

    #[test]
    fn test_mock_catalog_shape() {
        // デモカタログが3件で、例示の指示書を含むことを検証する。
        let catalog = mock_work_orders();
        assert_eq!(catalog.len(), 3);
        let gas = &catalog[0];
        assert_eq!(gas.work_order_number, "GAS-MAIN-2024-001");
        assert_eq!(gas.safety_checklist.len(), 3);
        assert!(gas.bom_contains("GASPIPE-HDPE-4IN"));
    }
}
