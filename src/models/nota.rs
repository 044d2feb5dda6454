use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDateTime;
use sqlx::FromRow;

/// 发票主表 (tbl_notas_fiscais)
#[derive(Debug, Clone, FromRow)]
pub struct Nota {
    pub id: i64,
    pub cnpj: String,
    pub razao_social: String,
    pub numero_nota: String,
    pub data_emissao: NaiveDateTime,
    #[sqlx(skip)]
    pub itens: Vec<Item>,
}

/// 发票明细 (tbl_itens)
#[derive(Debug, Clone, FromRow)]
pub struct Item {
    pub id: i64,
    pub nota_id: i64,
    pub codigo_item: String,
    pub descricao_item: String,
    pub quantidade: BigDecimal,
    pub valor_unitario: BigDecimal,
    pub imposto_item: BigDecimal,
}

impl Item {
    /// quantidade * valor_unitario
    pub fn valor(&self) -> BigDecimal {
        &self.quantidade * &self.valor_unitario
    }
}

impl Nota {
    pub fn valor_total(&self) -> BigDecimal {
        self.itens.iter().fold(BigDecimal::zero(), |acc, i| acc + i.valor())
    }

    pub fn imposto_total(&self) -> BigDecimal {
        self.itens
            .iter()
            .fold(BigDecimal::zero(), |acc, i| acc + &i.imposto_item)
    }

    /// |Σ(数量×单价) − Σ税额|
    pub fn diferenca(&self) -> BigDecimal {
        (self.valor_total() - self.imposto_total()).abs()
    }
}

/// 待写入的发票 (CSV 导入生成, 尚无 ID)
#[derive(Debug, Clone, PartialEq)]
pub struct NovaNota {
    pub cnpj: String,
    pub razao_social: String,
    pub numero_nota: String,
    pub data_emissao: NaiveDateTime,
    pub itens: Vec<NovoItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NovoItem {
    pub codigo_item: String,
    pub descricao_item: String,
    pub quantidade: BigDecimal,
    pub valor_unitario: BigDecimal,
    pub imposto_item: BigDecimal,
}
