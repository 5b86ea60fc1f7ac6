//! 制御サフィックス付きチャット本文のフィルタ
//!
//! WebSocket のメッセージ形状は 1 種類しかないため、入室・退室・強制退室・画像といった
//! 制御イベントは本文末尾のサフィックスとして送られてくる。ここではその本文を
//! 表示用のメッセージに分類・変換する。判定は上から順に評価し、最初に一致したものを採用する。

use super::{ImageRef, MessageBody, SessionContext};

/// 接続維持のために送る、画面には出さない本文
pub const KEEP_ALIVE_PLACEHOLDER: &str = "_EMPTY_SUFFIX";
/// 入室通知
pub const ENTER_MARKER: &str = "_ENTER_SUFFIX";
/// 退室通知
pub const EXIT_MARKER: &str = "_EXIT_SUFFIX";
/// 強制退室通知
pub const BAN_MARKER: &str = "_BAN_SUFFIX";
/// 画像メッセージ
pub const IMAGE_MARKER: &str = "_IMAGE_SUFFIX";
/// 制御サフィックス共通の末尾。未知の種類の判定に使う
pub const SUFFIX_TOKEN: &str = "_SUFFIX";

/// 画像参照 ID の固定長
pub const IMAGE_REFERENCE_LEN: usize = 22;

const JOIN_PHRASE: &str = " has joined";
const LEAVE_PHRASE: &str = " has left";
const BANNED_PHRASE: &str = " was banned.";

const ENTER_DECORATION: &str = " 🎉";
const EXIT_DECORATION: &str = " 🏃";
pub const BANNED_NOTICE: &str = "A participant was banned from this room.";
pub const UNSUPPORTED_NOTICE: &str =
    "[This message type is not supported yet. Please update the app to view it.]";

/// 本文がどこから来たか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// WebSocket で受信
    Socket,
    /// REST で取得した履歴
    History,
    /// 自分が送信したもの
    Local,
}

/// フィルタの判定結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// タイムラインに表示する
    Visible(MessageBody),
    /// 表示しない
    Discard,
    /// 自分の退室通知がサーバーを経由して戻ってきた（表示せず退室処理を行う）
    OwnExitConfirmed,
    /// 自分が強制退室させられた（表示せず通知する）
    BannedSelf,
}

/// 本文を分類する
///
/// `sender_id` が分かる場合はブロック判定と自分の退室エコーの判定に使う（自分の送信では `None`）。
pub fn filter_body(
    body: &str,
    sender_id: Option<&str>,
    origin: MessageOrigin,
    context: &SessionContext,
) -> FilterOutcome {
    if let Some(sender_id) = sender_id
        && context.is_blocked(sender_id)
    {
        return FilterOutcome::Discard;
    }

    if body == KEEP_ALIVE_PLACEHOLDER {
        return FilterOutcome::Discard;
    }

    if let Some(rest) = body.strip_suffix(ENTER_MARKER) {
        return text(format!("{rest}{ENTER_DECORATION}"));
    }

    if origin == MessageOrigin::Socket
        && sender_id.is_some_and(|id| context.is_me(id))
        && body == exit_notice(context.nickname.as_str())
    {
        return FilterOutcome::OwnExitConfirmed;
    }

    if let Some(rest) = body.strip_suffix(EXIT_MARKER) {
        return text(format!("{rest}{EXIT_DECORATION}"));
    }

    if body.ends_with(&ban_pattern(context.user_id.as_str())) {
        return FilterOutcome::BannedSelf;
    }

    if body.ends_with(BAN_MARKER) {
        return text(BANNED_NOTICE.to_string());
    }

    if let Some(prefix) = body.strip_suffix(IMAGE_MARKER) {
        let reference: String = prefix.chars().take(IMAGE_REFERENCE_LEN).collect();
        return FilterOutcome::Visible(MessageBody::Image(ImageRef::new(reference)));
    }

    if body.ends_with(SUFFIX_TOKEN) {
        return text(UNSUPPORTED_NOTICE.to_string());
    }

    text(body.to_string())
}

fn text(value: String) -> FilterOutcome {
    FilterOutcome::Visible(MessageBody::Text(value))
}

fn ban_pattern(user_id: &str) -> String {
    format!("{BANNED_PHRASE}{user_id}{BAN_MARKER}")
}

/// 入室通知の本文
pub fn enter_notice(nickname: &str) -> String {
    format!("{nickname}{JOIN_PHRASE}{ENTER_MARKER}")
}

/// 退室通知の本文
pub fn exit_notice(nickname: &str) -> String {
    format!("{nickname}{LEAVE_PHRASE}{EXIT_MARKER}")
}

/// 強制退室通知の本文（対象ユーザーの UID を埋め込む）
pub fn ban_notice(nickname: &str, user_id: &str) -> String {
    format!("{nickname}{BANNED_PHRASE}{user_id}{BAN_MARKER}")
}

/// 画像メッセージの本文
pub fn image_body(reference: &ImageRef) -> String {
    format!("{}{IMAGE_MARKER}", reference.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockedUsers, Nickname, UserId};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - filter_body の判定表（評価順を含む）
    //
    // 【なぜこのテストが必要か】
    // - 制御イベントは本文サフィックスでしか伝わらないため、判定を誤ると
    //   退室や強制退室が他の参加者に正しく伝わらない
    // ========================================

    const IMAGE_ID: &str = "img123abcdefghijklmnop";

    fn context() -> SessionContext {
        SessionContext::new(
            UserId::try_from("uid-me").unwrap(),
            Nickname::try_from("alice").unwrap(),
            BlockedUsers::from_ids(["uid-blocked"]),
        )
    }

    fn visible_text(outcome: FilterOutcome) -> String {
        match outcome {
            FilterOutcome::Visible(MessageBody::Text(text)) => text,
            other => panic!("expected visible text, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_passes_through() {
        // テスト項目: 通常の本文はそのままテキストになる
        // given (前提条件):
        let context = context();

        // when (操作):
        let outcome = filter_body("hello", Some("uid-bob"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(visible_text(outcome), "hello");
    }

    #[test]
    fn test_keep_alive_is_discarded() {
        // テスト項目: キープアライブ本文は表示されない
        // given (前提条件):
        let context = context();

        // when (操作):
        let outcome = filter_body(
            KEEP_ALIVE_PLACEHOLDER,
            Some("uid-bob"),
            MessageOrigin::Socket,
            &context,
        );

        // then (期待する結果):
        assert_eq!(outcome, FilterOutcome::Discard);
    }

    #[test]
    fn test_blocked_sender_is_discarded_regardless_of_body() {
        // テスト項目: ブロック済みユーザーの本文は内容に関係なく破棄される
        // given (前提条件):
        let context = context();
        let bodies = [
            "hello".to_string(),
            enter_notice("troll"),
            format!("{IMAGE_ID}{IMAGE_MARKER}"),
            ban_notice("carol", "uid-carol"),
        ];

        for body in bodies {
            // when (操作):
            let socket = filter_body(&body, Some("uid-blocked"), MessageOrigin::Socket, &context);
            let history = filter_body(&body, Some("uid-blocked"), MessageOrigin::History, &context);

            // then (期待する結果):
            assert_eq!(socket, FilterOutcome::Discard);
            assert_eq!(history, FilterOutcome::Discard);
        }
    }

    #[test]
    fn test_enter_marker_becomes_celebration() {
        // テスト項目: 入室サフィックスは祝福の表示に書き換えられる
        // given (前提条件):
        let context = context();
        let body = enter_notice("bob");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-bob"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(visible_text(outcome), "bob has joined 🎉");
    }

    #[test]
    fn test_own_exit_echo_on_socket_confirms_exit() {
        // テスト項目: ソケットで戻ってきた自分の退室通知は退室確定として扱われる
        // given (前提条件):
        let context = context();
        let body = exit_notice("alice");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-me"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(outcome, FilterOutcome::OwnExitConfirmed);
    }

    #[test]
    fn test_exit_with_my_nickname_from_someone_else_is_a_leave_notice() {
        // テスト項目: 同じニックネームの別ユーザーの退室通知は自分の退室として扱われない
        // given (前提条件):
        let context = context();
        let body = exit_notice("alice");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-bob"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(visible_text(outcome), "alice has left 🏃");
    }

    #[test]
    fn test_own_exit_in_history_is_a_leave_notice() {
        // テスト項目: 履歴中の自分の退室通知は通常の退室表示になる
        // given (前提条件):
        let context = context();
        let body = exit_notice("alice");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-me"), MessageOrigin::History, &context);

        // then (期待する結果):
        assert_eq!(visible_text(outcome), "alice has left 🏃");
    }

    #[test]
    fn test_other_exit_becomes_leave_notice() {
        // テスト項目: 他の参加者の退室サフィックスは退室表示になる
        // given (前提条件):
        let context = context();
        let body = exit_notice("bob");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-bob"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(visible_text(outcome), "bob has left 🏃");
    }

    #[test]
    fn test_ban_naming_me_is_hidden_and_reported() {
        // テスト項目: 自分を対象とした強制退室通知は表示されず通知扱いになる
        // given (前提条件):
        let context = context();
        let body = ban_notice("alice", "uid-me");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-owner"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(outcome, FilterOutcome::BannedSelf);
    }

    #[test]
    fn test_ban_naming_someone_else_is_generic() {
        // テスト項目: 他人を対象とした強制退室通知は汎用の表示になる
        // given (前提条件):
        let context = context();
        let body = ban_notice("carol", "uid-carol");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-owner"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(visible_text(outcome), BANNED_NOTICE);
    }

    #[test]
    fn test_image_marker_strips_to_reference() {
        // テスト項目: 画像サフィックスの本文はサフィックスを除いた参照 ID の画像になる
        // given (前提条件):
        let context = context();
        let body = format!("{IMAGE_ID}{IMAGE_MARKER}");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-bob"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(
            outcome,
            FilterOutcome::Visible(MessageBody::Image(ImageRef::new(IMAGE_ID.to_string())))
        );
    }

    #[test]
    fn test_image_reference_is_truncated_to_fixed_length() {
        // テスト項目: 参照 ID は固定長で切り詰められる
        // given (前提条件):
        let context = context();
        let body = format!("{IMAGE_ID}trailing{IMAGE_MARKER}");

        // when (操作):
        let outcome = filter_body(&body, None, MessageOrigin::Local, &context);

        // then (期待する結果):
        match outcome {
            FilterOutcome::Visible(MessageBody::Image(reference)) => {
                assert_eq!(reference.as_str(), IMAGE_ID);
                assert_eq!(reference.as_str().len(), IMAGE_REFERENCE_LEN);
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_suffix_falls_back_to_update_notice() {
        // テスト項目: 未知のサフィックスはアップデートを促す表示になる
        // given (前提条件):
        let context = context();

        // when (操作):
        let outcome = filter_body(
            "sticker:42_STICKER_SUFFIX",
            Some("uid-bob"),
            MessageOrigin::Socket,
            &context,
        );

        // then (期待する結果):
        assert_eq!(visible_text(outcome), UNSUPPORTED_NOTICE);
    }

    #[test]
    fn test_marker_in_the_middle_is_plain_text() {
        // テスト項目: 末尾でないマーカーは通常のテキストとして扱われる
        // given (前提条件):
        let context = context();
        let body = format!("look {IMAGE_MARKER} here");

        // when (操作):
        let outcome = filter_body(&body, Some("uid-bob"), MessageOrigin::Socket, &context);

        // then (期待する結果):
        assert_eq!(visible_text(outcome), body);
    }
}
