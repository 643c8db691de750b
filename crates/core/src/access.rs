//! PIN による作者の解決と、ドキュメントの編集可否の判定。

use subtle::ConstantTimeEq;

/// 共有 PIN → 作者メールアドレスの対応表。
#[derive(Debug, Clone, Default)]
pub struct PinTable {
    entries: Vec<(String, String)>,
}

impl PinTable {
    /// PIN とメールアドレスの組から表を作る。どちらかが空の組は無視する。
    pub fn new<I, P, E>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, E)>,
        P: Into<String>,
        E: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(pin, email)| (pin.into(), email.into()))
            .filter(|(pin, email)| !pin.is_empty() && !email.is_empty())
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// PIN に対応するメールアドレスを返す。
    ///
    /// 比較は定数時間で行い、一致の有無にかかわらず全件を走査する。
    pub fn resolve(&self, pin: &str) -> Option<&str> {
        let mut found = None;
        for (candidate, email) in &self.entries {
            if bool::from(candidate.as_bytes().ct_eq(pin.as_bytes())) && found.is_none() {
                found = Some(email.as_str());
            }
        }
        found
    }
}

/// 秘密値を定数時間で比較する。
pub fn secrets_match(expected: &str, given: &str) -> bool {
    bool::from(expected.as_bytes().ct_eq(given.as_bytes()))
}

/// ドキュメントの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// 日記エントリ
    Entry,
    DayMark,
    WallPin,
}

/// 編集可否の判定に必要なドキュメントの情報。
#[derive(Debug, Clone, Copy)]
pub struct OwnedDocument<'a> {
    pub kind: DocumentKind,
    /// 参照先の作者のメールアドレス（不明なら `None`）
    pub author_email: Option<&'a str>,
    pub published: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDecision {
    Allowed,
    NotOwner,
    /// 公開後は誰も変更できない
    Sealed,
}

/// 編集者がドキュメントを変更できるかを判定する。
///
/// 作者・編集者のどちらかのメールアドレスが不明な場合は所有者として扱う。
/// 日付の印とピンは公開された時点で封印され、所有者の判定より優先される。
pub fn edit_decision(doc: &OwnedDocument<'_>, requester_email: Option<&str>) -> EditDecision {
    if matches!(doc.kind, DocumentKind::DayMark | DocumentKind::WallPin) && doc.published {
        return EditDecision::Sealed;
    }

    match (doc.author_email, requester_email) {
        (Some(author), Some(requester)) if author != requester => EditDecision::NotOwner,
        _ => EditDecision::Allowed,
    }
}
