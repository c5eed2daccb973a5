//! 現場キャプチャセッション（ジョブパケット）の状態管理。

use anyhow::Result;

use crate::workorder::{self, ChecklistItem, WorkOrderPacket};

/// 提出可能になったパケットから生成される不変ペイロード。
#[derive(Clone, Debug)]
pub struct FieldSubmission {
    /// 選択していた作業指示書のスナップショット。
    pub work_order: WorkOrderPacket,
    /// 確定済みの安全チェックリスト。
    pub completed_checklist: Vec<ChecklistItem>,
    /// スキャンした資材ID。
    pub material_id: String,
    /// 資材IDがBOMと完全一致したか。
    pub material_verified: bool,
    /// 取得済みのGPS座標文字列。
    pub gps_coords: String,
    /// 撮影済みの写真データ（base64 data URL）。
    pub photo_data: String,
}

/// 1件の作業に対するキャプチャセッション。
///
/// 状態は単一の離散タグではなく独立したフィールドの組で持つ。
/// 全フィールドが揃ったときだけ提出が有効になり、提出後は
/// すべて初期状態へ戻る（セッションをまたいで状態を持たない）。
#[derive(Clone, Debug, Default)]
pub struct JobPacket {
    /// 選択中の作業指示書。
    pub work_order: Option<WorkOrderPacket>,
    /// 確定済みチェックリスト（未確定ならNone）。
    pub completed_checklist: Option<Vec<ChecklistItem>>,
    /// スキャン済み資材ID。
    pub material_id: Option<String>,
    /// 資材検証フラグ。
    pub material_verified: bool,
    /// GPS座標文字列。
    pub gps_coords: Option<String>,
    /// 写真データ。
    pub photo_data: Option<String>,
}

impl JobPacket {
    /// 空のセッションを作成する。
    pub fn new() -> Self {
        Self::default()
    }

    /// カタログから作業指示書を選択する。
    ///
    /// 別の指示書を選び直した場合、チェックリストとキャプチャ値は
    /// 引き継がずに全てリセットする。
    pub fn select_work_order(&mut self, wo: WorkOrderPacket) {
        self.reset();
        self.work_order = Some(wo);
    }

    /// JSONテキストから作業指示書を取り込む。
    ///
    /// 検証に失敗した場合は現在の選択を変更しない。
    pub fn import_work_order(&mut self, text: &str) -> Result<()> {
        // 検証が通ってから初めて状態へ反映する。
        let wo = workorder::import_from_str(text)?;
        self.select_work_order(wo);
        Ok(())
    }

    /// 確定済みチェックリストをセッションへ凍結する。
    pub fn freeze_checklist(&mut self, items: Vec<ChecklistItem>) {
        self.completed_checklist = Some(items);
    }

    /// チェックリストが確定済みか判定する。
    pub fn checklist_done(&self) -> bool {
        self.completed_checklist.is_some()
    }

    /// 資材・GPS・写真のキャプチャ操作が許可されるか判定する。
    pub fn capture_allowed(&self) -> bool {
        // 指示書選択とチェックリスト確定の両方がゲートになる。
        self.work_order.is_some() && self.checklist_done()
    }

    /// スキャン結果の資材IDを記録し、BOMと照合する。
    ///
    /// 照合は選択中の指示書のBOMに対する集合メンバーシップ判定で、
    /// 指示書が未選択なら常に未検証となる。再スキャンで上書きできる。
    pub fn record_material(&mut self, raw_value: String) {
        self.material_verified = self
            .work_order
            .as_ref()
            .map(|wo| wo.bom_contains(&raw_value))
            .unwrap_or(false);
        self.material_id = Some(raw_value);
    }

    /// 取得したGPS座標を記録する。
    pub fn record_gps(&mut self, coords: String) {
        self.gps_coords = Some(coords);
    }

    /// 撮影した写真データを記録する。
    pub fn record_photo(&mut self, data: String) {
        self.photo_data = Some(data);
    }

    /// 提出ボタンが有効になる条件を判定する。
    pub fn ready_to_submit(&self) -> bool {
        // 指示書・チェックリスト・資材・GPS・写真の全てが必要。
        self.work_order.is_some()
            && self.checklist_done()
            && self.material_id.is_some()
            && self.gps_coords.is_some()
            && self.photo_data.is_some()
    }

    /// 提出ペイロードを生成し、セッションを初期状態へ戻す。
    ///
    /// 条件が揃っていなければNoneを返し、状態は変更しない。
    pub fn submit(&mut self) -> Option<FieldSubmission> {
        if !self.ready_to_submit() {
            return None;
        }
        // ready_to_submitが真ならここで全フィールドが取り出せる。
        let submission = FieldSubmission {
            work_order: self.work_order.take()?,
            completed_checklist: self.completed_checklist.take()?,
            material_id: self.material_id.take()?,
            material_verified: self.material_verified,
            gps_coords: self.gps_coords.take()?,
            photo_data: self.photo_data.take()?,
        };
        // 残りのフィールドも初期化する。
        self.reset();
        Some(submission)
    }

    /// セッションの全フィールドを初期状態へ戻す。
    pub fn reset(&mut self) {
        self.work_order = None;
        self.completed_checklist = None;
        self.material_id = None;
        self.material_verified = false;
        self.gps_coords = None;
        self.photo_data = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::mock_work_orders;

    /// ガス工事の指示書を選択した状態のパケットを作る。
    fn packet_with_gas_order() -> JobPacket {
        let mut packet = JobPacket::new();
        packet.select_work_order(mock_work_orders()[0].clone());
        packet
    }

    /// チェックリストを全完了として凍結する。
    fn freeze_all(packet: &mut JobPacket) {
        let mut items = packet
            .work_order
            .as_ref()
            .map(|wo| wo.safety_checklist.clone())
            .unwrap_or_default();
        for item in &mut items {
            item.completed = true;
        }
        packet.freeze_checklist(items);
    }

    #[test]
    fn test_capture_gated_by_checklist() {
        // チェックリスト確定までキャプチャ不可を検証する。
        let mut packet = packet_with_gas_order();
        assert!(!packet.capture_allowed());
        freeze_all(&mut packet);
        assert!(packet.capture_allowed());
    }

    #[test]
    fn test_material_verification_by_bom_membership() {
        // BOM完全一致のときのみ検証済みになることを検証する。
        let mut packet = packet_with_gas_order();
        freeze_all(&mut packet);

        packet.record_material("GASPIPE-HDPE-4IN".into());
        assert!(packet.material_verified);

        // 再スキャンで上書きでき、未知IDは未検証になる。
        packet.record_material("UNKNOWN-PART".into());
        assert!(!packet.material_verified);
        assert_eq!(packet.material_id.as_deref(), Some("UNKNOWN-PART"));
    }

    #[test]
    fn test_material_unverified_without_work_order() {
        // 指示書未選択なら常に未検証であることを検証する。
        let mut packet = JobPacket::new();
        packet.record_material("GASPIPE-HDPE-4IN".into());
        assert!(!packet.material_verified);
    }

    #[test]
    fn test_submit_enabled_iff_all_fields_present() {
        // 提出可否が全フィールドの同時充足と一致することを検証する。
        let mut packet = packet_with_gas_order();
        assert!(!packet.ready_to_submit());
        freeze_all(&mut packet);
        assert!(!packet.ready_to_submit());
        packet.record_material("VALVE-GAS-4IN-PE".into());
        assert!(!packet.ready_to_submit());
        packet.record_gps("40.712800° N, 74.006000° W".into());
        assert!(!packet.ready_to_submit());
        packet.record_photo("data:image/bmp;base64,QUJD".into());
        assert!(packet.ready_to_submit());
        // 提出不可の間はsubmitが何も返さない。
        let mut early = packet_with_gas_order();
        assert!(early.submit().is_none());
    }

    #[test]
    fn test_submit_resets_session() {
        // 提出後に全フィールドが初期状態へ戻ることを検証する。
        let mut packet = packet_with_gas_order();
        freeze_all(&mut packet);
        packet.record_material("GASPIPE-HDPE-4IN".into());
        packet.record_gps("40.712800° N, 74.006000° W".into());
        packet.record_photo("data:image/bmp;base64,QUJD".into());

        let submission = packet.submit().unwrap();
        assert_eq!(submission.work_order.work_order_number, "GAS-MAIN-2024-001");
        assert!(submission.material_verified);
        assert_eq!(submission.completed_checklist.len(), 3);

        assert!(packet.work_order.is_none());
        assert!(packet.completed_checklist.is_none());
        assert!(packet.material_id.is_none());
        assert!(!packet.material_verified);
        assert!(packet.gps_coords.is_none());
        assert!(packet.photo_data.is_none());
    }

    #[test]
    fn test_reselect_drops_partial_capture() {
        // 指示書の選び直しで途中状態を引き継がないことを検証する。
        let mut packet = packet_with_gas_order();
        freeze_all(&mut packet);
        packet.record_material("GASPIPE-HDPE-4IN".into());

        packet.select_work_order(mock_work_orders()[1].clone());
        assert!(!packet.checklist_done());
        assert!(packet.material_id.is_none());
        assert!(!packet.material_verified);
    }

    #[test]
    fn test_failed_import_keeps_selection() {
        // 取り込み失敗時に既存の選択が残ることを検証する。
        let mut packet = packet_with_gas_order();
        let err = packet.import_work_order(r#"{"task": "t"}"#);
        assert!(err.is_err());
        assert_eq!(
            packet.work_order.as_ref().unwrap().work_order_number,
            "GAS-MAIN-2024-001"
        );
    }
}
