//! 値オブジェクト

use std::fmt;

use super::ValueObjectError;

macro_rules! string_value_object {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// 空でない文字列から作成
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                if value.trim().is_empty() {
                    return Err(ValueObjectError::Empty($label));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueObjectError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_value_object!(
    /// チャットルーム ID（= 公募投稿の ID）
    RoomId,
    "room id"
);

string_value_object!(
    /// ユーザーの UID
    UserId,
    "user id"
);

string_value_object!(
    /// 表示名
    Nickname,
    "nickname"
);

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// アップロード済み画像の参照 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// メディア配信 URL と結合した画像 URL
    pub fn url(&self, media_base_url: &str) -> String {
        format!("{}/{}", media_base_url.trim_end_matches('/'), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_rejects_blank() {
        // テスト項目: 空白のみのルーム ID は作成できない
        // given (前提条件):
        let value = "   ".to_string();

        // when (操作):
        let result = RoomId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::Empty("room id")));
    }

    #[test]
    fn test_user_id_round_trips_string() {
        // テスト項目: UserId が元の文字列を保持する
        // given (前提条件):
        let value = "uid-1";

        // when (操作):
        let user_id = UserId::try_from(value).unwrap();

        // then (期待する結果):
        assert_eq!(user_id.as_str(), "uid-1");
        assert_eq!(user_id.to_string(), "uid-1");
    }

    #[test]
    fn test_timestamp_ordering() {
        // テスト項目: Timestamp が時刻順に比較できる
        // given (前提条件):
        let earlier = Timestamp::new(1000);
        let later = Timestamp::new(2000);

        // when (操作):

        // then (期待する結果):
        assert!(earlier < later);
        assert_eq!(earlier.max(later), later);
    }

    #[test]
    fn test_image_ref_url_joins_without_double_slash() {
        // テスト項目: 画像 URL が余分なスラッシュなしで結合される
        // given (前提条件):
        let image = ImageRef::new("abc".to_string());

        // when (操作):
        let url = image.url("http://media.example/api/v1/media/");

        // then (期待する結果):
        assert_eq!(url, "http://media.example/api/v1/media/abc");
    }
}
