/// Pops the evaluation stack into a variable (`VAR=` / `temp=`).
#[derive(Debug, Clone)]
pub struct VariableAssignment {
    pub is_global: bool,
    pub is_new_declaration: bool,
    pub variable_name: String,
}

impl VariableAssignment {
    pub fn new(variable_name: &str, is_new_declaration: bool, is_global: bool) -> Self {
        VariableAssignment {
            is_global,
            is_new_declaration,
            variable_name: variable_name.to_string(),
        }
    }
}
