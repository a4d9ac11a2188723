//! ExecutorListener port - ホストへのライフサイクル通知
//!
//! ホストループ（描画エンジンのフレームコールバックなど）に組み込まれる
//! executor が、登録・解除・有効化・無効化・終了を通知するためのフック。
//! 全メソッドにデフォルト実装（何もしない）がある。

use crate::domain::ExecutorName;

pub trait ExecutorListener: Send + Sync {
    /// registry に登録され、サービスを開始した
    fn on_started(&self, _executor: &ExecutorName) {}

    /// registry から外され、サービスを終了した
    fn on_stopped(&self, _executor: &ExecutorName) {}

    fn on_enabled(&self, _executor: &ExecutorName) {}

    fn on_disabled(&self, _executor: &ExecutorName) {}

    fn on_terminated(&self, _executor: &ExecutorName) {}
}
