use phf::phf_map;

/// 页面中发现的附属资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// 音频（需要转写）
    Audio,
    /// 数据文件（由生成的代码自行下载）
    Data,
    /// 图片（作为视觉上下文）
    Image,
}

/// 扩展名 → 资源类型
static EXTENSIONS: phf::Map<&'static str, ResourceKind> = phf_map! {
    "mp3" => ResourceKind::Audio,
    "wav" => ResourceKind::Audio,
    "ogg" => ResourceKind::Audio,
    "opus" => ResourceKind::Audio,
    "m4a" => ResourceKind::Audio,
    "flac" => ResourceKind::Audio,
    "webm" => ResourceKind::Audio,
    "csv" => ResourceKind::Data,
    "tsv" => ResourceKind::Data,
    "xlsx" => ResourceKind::Data,
    "xls" => ResourceKind::Data,
    "json" => ResourceKind::Data,
    "parquet" => ResourceKind::Data,
    "png" => ResourceKind::Image,
    "jpg" => ResourceKind::Image,
    "jpeg" => ResourceKind::Image,
    "gif" => ResourceKind::Image,
    "webp" => ResourceKind::Image,
};

impl ResourceKind {
    /// 根据 URL 或路径的扩展名判断资源类型（忽略查询串和片段）
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file_name.rsplit_once('.')?;
        EXTENSIONS.get(ext.to_ascii_lowercase().as_str()).copied()
    }

    /// 文件扩展名，用于上传音频时推断 MIME
    pub fn extension(url: &str) -> Option<String> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}
