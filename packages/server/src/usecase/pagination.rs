//! ページング条件

/// 一覧取得のページ指定
///
/// 1 始まりのページ番号とページサイズを持ち、Repository に渡す limit / offset に変換する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    page_size: usize,
}

impl Pagination {
    pub const DEFAULT_PAGE: i64 = 1;
    pub const DEFAULT_PAGE_SIZE: i64 = 50;
    /// 0 以下のページサイズが指定されたときに使う値
    pub const FALLBACK_PAGE_SIZE: usize = 10;

    /// クエリパラメータからページ指定を作成
    ///
    /// 未指定はデフォルト値、0 以下のページは 1、0 以下のページサイズは 10 に丸める。
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.unwrap_or(Self::DEFAULT_PAGE);
        let page_size = page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE);
        Self {
            page: usize::try_from(page).ok().filter(|p| *p >= 1).unwrap_or(1),
            page_size: usize::try_from(page_size)
                .ok()
                .filter(|s| *s >= 1)
                .unwrap_or(Self::FALLBACK_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
