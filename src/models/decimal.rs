//! BigDecimal 以 JSON 数字输出 (前端直接调用 toFixed / toLocaleString)

use bigdecimal::BigDecimal;
use serde::Serializer;

pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // 经由十进制字符串转换, 得到与字面量一致的最近 f64
    let number = value.to_string().parse::<f64>().map_err(serde::ser::Error::custom)?;
    serializer.serialize_f64(number)
}
